use thiserror::Error;

use crate::scheduler::task::TaskQueue;

/// Errors produced by the media scheduling layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A task queue has reached its configured capacity
    #[error("Queue {queue:?} is full (limit {limit})")]
    CapacityExceeded {
        /// The queue that rejected the registration
        queue: TaskQueue,
        /// Its configured capacity
        limit: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A registered task reported a failure
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Error from the RTP transport core
    #[error("Transport error: {0}")]
    Transport(#[from] mediagw_rtp_core::Error),
}
