//! Configuration and logging setup for the rgo language client

pub mod config;
pub mod logging;

pub use config::{ClientSettings, LogFormat, LoggingConfig, RgoConfig};
