//! Defines error types emitted by the worker pool's threads

use thiserror::Error;

/// The abstract error type the worker pool emits
#[derive(Clone, Debug, Error)]
pub enum WorkerPoolError {
    /// The coordinator cancelled the pool's execution
    #[error("worker pool cancelled: {0}")]
    Cancelled(String),
    /// The dispatch queue between maintenance and the executor closed
    #[error("dispatch queue closed: {0}")]
    DispatchQueueClosed(String),
    /// Error setting up the worker pool
    #[error("error setting up the worker pool: {0}")]
    Setup(String),
}

impl WorkerPoolError {
    /// Create a cancellation error
    pub(crate) fn cancelled() -> Self {
        Self::Cancelled("received cancel signal".to_string())
    }
}
