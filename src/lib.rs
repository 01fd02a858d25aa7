//! Scout - test suite orchestration with failure alerting
//!
//! Runs an external test framework for every configured environment/suite
//! pair, captures its reports, and on failure sends an email and/or pages
//! on-call with the captured evidence.

pub mod capture;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod executor;
pub mod notify;
pub mod orchestrator;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use config::{ConfigStore, EnvironmentConfig, SuiteConfig};
pub use executor::{RunOutput, SuiteExecutor};
pub use notify::Notifier;
pub use orchestrator::{Orchestrator, Selection};
