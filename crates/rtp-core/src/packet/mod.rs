//! Views of parsed RTP and RTCP data
//!
//! Wire parsing lives in the network layer; the transport core only
//! consumes the already-parsed header fields plus a borrowed payload
//! range, and copies out the bytes it keeps.

pub mod ntp;

pub use ntp::NtpTimestamp;

use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Borrowed view of one inbound RTP packet.
///
/// The receive path owns the datagram storage. The jitter buffer and
/// the statistics tracker read the header fields and copy the payload
/// into pooled storage when they need to keep it.
#[derive(Debug, Clone, Copy)]
pub struct RtpPacketView<'a> {
    /// 16-bit sequence number from the fixed header (wraps at 65536)
    pub sequence_number: RtpSequenceNumber,

    /// RTP media-clock timestamp (wraps at 2^32)
    pub timestamp: RtpTimestamp,

    /// Synchronization source of the sender
    pub ssrc: RtpSsrc,

    /// Payload type from the fixed header
    pub payload_type: u8,

    /// Marker bit
    pub marker: bool,

    /// Payload bytes, borrowed from the datagram
    pub payload: &'a [u8],
}

/// Fields of a received RTCP Sender Report that the statistics
/// tracker consumes.
#[derive(Debug, Clone, Copy)]
pub struct SenderReportInfo {
    /// Synchronization source of the reporting sender
    pub ssrc: RtpSsrc,

    /// 64-bit NTP timestamp carried by the report
    pub ntp: NtpTimestamp,

    /// RTP timestamp correlated with the NTP timestamp
    pub rtp_timestamp: RtpTimestamp,

    /// Sender's cumulative packet count
    pub packet_count: u32,

    /// Sender's cumulative octet count
    pub octet_count: u32,
}
