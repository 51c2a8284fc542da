//! RelicSeek CLI library.
//!
//! This library provides the core functionality for the RelicSeek command-line
//! interface: configuration management, engine wiring, command execution and
//! output formatting.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod repl;

pub use cli::{Cli, Command};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use output::Formatter;
