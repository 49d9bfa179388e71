//! Foundation Layer - shared types for the rgo language client
//!
//! - [`error`]: the [`RgoError`] taxonomy every crate reports through
//! - [`ui`]: the editor-UI collaborator traits consumed by the client core
//! - [`terminal`]: the terminal collaborator used by binary installs

pub mod error;
pub mod terminal;
pub mod ui;

pub use error::{RgoError, RgoResult};
pub use terminal::{TerminalExit, TerminalRunner};
pub use ui::{EditorUi, MessageSeverity, ProgressIndicator, ProgressOptions};
