//! # Streaming Error Types
//!
//! The lifecycle operations themselves never fail: admission, reclamation,
//! write-back and the apply drain are all infallible once the system is
//! running. Errors only come from construction (config, worker threads) and
//! from dispatching work after shutdown.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up or feeding the streaming system.
#[derive(Error, Debug)]
pub enum StreamingError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A generation worker thread could not be started.
    #[error("failed to spawn generation worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Work was submitted after the worker pool shut down.
    #[error("generation worker pool is shut down")]
    ShutDown,
}

/// Result type for streaming setup operations.
pub type StreamingResult<T> = Result<T, StreamingError>;
