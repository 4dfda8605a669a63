//! Error types for the config-file watcher

use loudcal_core::CoreError;
use loudcal_engine::EngineError;
use thiserror::Error;

/// Result type for config-file operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or creating the config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Native file notifications could not be set up
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
