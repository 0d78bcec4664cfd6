//! Dispatcher error types
//!
//! Invocation errors are reported before any lane starts. Per-item failures
//! never surface here; they are recorded inside the aggregate response.

use thiserror::Error;

/// Errors reported by the batch dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("Batch of {size} items exceeds the maximum batch size of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Batch was cancelled before this item started")]
    Cancelled,

    #[error("Batch was abandoned before completion")]
    Abandoned,
}
