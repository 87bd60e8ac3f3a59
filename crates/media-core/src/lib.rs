//! Media task scheduling for the mediagw media server
//!
//! This crate runs the periodic media graph: every active task (packet
//! readers, mixer stages, packet writers) registers with a
//! [`Scheduler`], which drives them all once per tick in a fixed
//! pipeline order. The tick cadence matches the audio frame duration,
//! 20ms by default.
//!
//! The transport primitives the tasks operate on (jitter buffers,
//! statistics, the media clock) live in `mediagw-rtp-core`.

mod error;

pub mod scheduler;

pub use error::Error;

pub use scheduler::task::{MediaTask, TaskHandle, TaskQueue};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerMetrics};

/// Result type for media scheduling operations
pub type Result<T> = std::result::Result<T, Error>;
