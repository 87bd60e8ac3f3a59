//! Reception statistics
//!
//! RFC 3550 quality accounting for received streams: the interarrival
//! jitter recursion and the per-SSRC counters that feed RTCP receiver
//! report blocks.

pub mod jitter;
pub mod member;

pub use jitter::JitterEstimator;
pub use member::{MemberStatistics, ReportBlockData};
