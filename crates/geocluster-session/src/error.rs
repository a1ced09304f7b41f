//! Session error types.

use thiserror::Error;

/// Errors returned by the background clustering worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("clustering worker has stopped")]
    Closed,

    #[error("clustering task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("config error: {0}")]
    Config(#[from] geocluster_core::ConfigError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
