//! LoudCal Daemon Library
//!
//! Command-line host for the loudness engine: loads the daemon config,
//! opens the JSON preference store and runs the config-file watcher.
//!
//! This library exposes the commands for testing purposes.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{SetArgs, StatusReport};
pub use crate::config::DaemonConfig;
pub use error::{DaemonError, Result};
