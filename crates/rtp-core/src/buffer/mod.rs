//! Receive-side buffering
//!
//! This module contains the two pieces that sit between the network
//! receive path and the media graph:
//!
//! - `pool`: pre-allocated frame storage so the hot path never
//!   allocates per packet
//! - `jitter`: the reordering buffer that turns bursty, out-of-order
//!   network arrivals into a steady in-order playout stream

pub mod jitter;
pub mod pool;

pub use jitter::{Frame, JitterBuffer, JitterBufferConfig, JitterBufferStats};
pub use pool::{FramePool, PoolStats, PooledFrame};
