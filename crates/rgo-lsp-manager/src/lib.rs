//! Binary provisioning for the rgo language client
//!
//! The client depends on two Go-built executables: the language server itself
//! and the packages driver used by Go tooling. This crate knows where they
//! live and how to install them:
//!
//! - [`InstallSpec`] parses a configured `go install` command into the name of
//!   the binary it produces.
//! - [`BinaryProvisioner`] checks `$GOPATH/bin` for that binary and runs the
//!   install command in a user-visible terminal, judging success by the real
//!   process exit status.
//! - [`ExtensionLayout`] resolves the server executable bundled with the
//!   extension (`<extension_dir>/bin/rgo_lsp_server`).

mod install_spec;
mod installer;
mod locator;
mod terminal;

pub use install_spec::InstallSpec;
pub use installer::{user_message, BinaryProvisioner, InstallRequest};
pub use locator::{
    go_bin_dir, installed_binary_path, BinaryLocator, ExtensionLayout, GOPATH_ENV,
    SERVER_BINARY_NAME,
};
pub use terminal::ShellTerminal;
