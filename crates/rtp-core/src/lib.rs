//! RTP transport core for the mediagw media server
//!
//! This crate provides the timing, reordering and statistics engine
//! that the rest of the media server builds on:
//!
//! - `time`: the session media clock and RTP timestamp conversions
//! - `packet`: borrowed views of parsed RTP/RTCP data
//! - `buffer`: the frame memory pool and the receive jitter buffer
//! - `stats`: per-source RFC 3550 reception statistics
//!
//! Signaling (MGCP/SDP), codec processing and the network sockets are
//! external collaborators: they feed parsed packets into this crate
//! and consume the ordered frames and report data it produces.

mod error;

pub mod buffer;
pub mod packet;
pub mod stats;
pub mod time;

// Re-export core types
pub use error::Error;

pub use buffer::{Frame, FramePool, JitterBuffer, JitterBufferConfig, JitterBufferStats, PooledFrame};
pub use packet::{NtpTimestamp, RtpPacketView, SenderReportInfo};
pub use stats::{JitterEstimator, MemberStatistics, ReportBlockData};
pub use time::{ClockSample, MediaClock};

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Result type for RTP transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        ClockSample, Error, Frame, JitterBuffer, JitterBufferConfig, MediaClock,
        MemberStatistics, Result, RtpPacketView, RtpSequenceNumber, RtpSsrc, RtpTimestamp,
    };
}
