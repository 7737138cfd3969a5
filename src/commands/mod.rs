//! Front-end command handlers
//!
//! Argument parsing, application startup and the terminal presentation layer.
//! A GUI front-end would replace `console` and reuse the rest.

pub mod cli;
pub mod console;
pub mod startup;

pub use cli::Cli;
pub use console::{run_console, run_once, ConsolePresentation};
pub use startup::{bootstrap, App, Startup, StartupFailure};
