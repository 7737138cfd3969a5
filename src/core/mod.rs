//! Core business logic module
//!
//! This module contains the domain models, configuration, the privilege and
//! tool lookup steps run at startup, and the job machinery.

pub mod backends;
pub mod config;
pub mod host;
pub mod models;
pub mod options;
pub mod privilege;
pub mod runner;
pub mod runtime;
pub mod tool_locator;

#[cfg(test)]
mod host_integration_tests;

// Re-export commonly used types
pub use config::AppConfig;
pub use host::JobHost;
