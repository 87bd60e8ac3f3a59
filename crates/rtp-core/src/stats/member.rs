//! Per-SSRC reception statistics (RFC 3550 Section 6.4 and Appendix A)

use tracing::{debug, trace};

use super::jitter::JitterEstimator;
use crate::packet::{RtpPacketView, SenderReportInfo};
use crate::time::ClockSample;
use crate::{RtpSequenceNumber, RtpSsrc};

/// Forward sequence steps below this advance the highest sequence
/// seen; at or above it the packet is reordered or a restart. Half the
/// 16-bit sequence space, per RFC 3550 Appendix A.1.
const SEQ_FORWARD_THRESHOLD: u16 = 0x8000;

/// Contents of one RTCP report block for a remote sender.
///
/// Field layout and units follow RFC 3550 Section 6.4.1; serialization
/// onto the wire is left to the RTCP packet writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportBlockData {
    /// SSRC of the source this block describes
    pub ssrc: RtpSsrc,

    /// Fraction of packets lost since the previous report, as a fixed
    /// point number with the binary point at the left edge (0..=255)
    pub fraction_lost: u8,

    /// Cumulative number of packets lost since the stream began
    pub cumulative_lost: u64,

    /// Extended highest sequence number received
    pub extended_highest_sequence: u64,

    /// Interarrival jitter in RTP timestamp units
    pub interarrival_jitter: u32,

    /// Middle 32 bits of the NTP timestamp of the last sender report,
    /// or zero if none has been received
    pub last_sr: u32,

    /// Delay since that sender report arrived, in 1/65536 second
    /// units, or zero if none has been received
    pub delay_since_last_sr: u32,
}

/// Reception statistics for one remote synchronization source.
///
/// One instance tracks one SSRC: it consumes every RTP packet and
/// sender report from that source and produces the report block the
/// local endpoint sends back. Interval state (the loss fraction
/// baseline) resets when a report block is generated, not when a
/// sender report arrives.
#[derive(Debug)]
pub struct MemberStatistics {
    ssrc: RtpSsrc,

    base_sequence: Option<RtpSequenceNumber>,
    highest_sequence: Option<RtpSequenceNumber>,
    /// Extended-sequence high bits, in units of 65536
    sequence_cycles: u64,

    packets_received: u64,
    octets_received: u64,
    out_of_order: u64,

    /// Interval state, reset on report generation
    received_since_report: u64,
    expected_at_last_report: u64,

    estimator: JitterEstimator,

    last_sr_ntp: u32,
    last_sr_arrival: Option<ClockSample>,
}

impl MemberStatistics {
    /// Create statistics tracking for one SSRC
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            base_sequence: None,
            highest_sequence: None,
            sequence_cycles: 0,
            packets_received: 0,
            octets_received: 0,
            out_of_order: 0,
            received_since_report: 0,
            expected_at_last_report: 0,
            estimator: JitterEstimator::new(),
            last_sr_ntp: 0,
            last_sr_arrival: None,
        }
    }

    /// The SSRC this instance tracks
    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    /// Record one arriving RTP packet from this source
    pub fn on_receive_rtp(&mut self, packet: &RtpPacketView<'_>, arrival: ClockSample) {
        self.packets_received += 1;
        self.received_since_report += 1;
        self.octets_received += packet.payload.len() as u64;

        let seq = packet.sequence_number;
        match self.highest_sequence {
            None => {
                self.base_sequence = Some(seq);
                self.highest_sequence = Some(seq);
            }
            Some(highest) => {
                let forward = seq.wrapping_sub(highest);
                if forward != 0 && forward < SEQ_FORWARD_THRESHOLD {
                    if seq < highest {
                        self.sequence_cycles += 1 << 16;
                        debug!(
                            ssrc = self.ssrc,
                            "Sequence wraparound: {} -> {}", highest, seq
                        );
                    }
                    self.highest_sequence = Some(seq);
                } else {
                    self.out_of_order += 1;
                    trace!(ssrc = self.ssrc, "Out-of-order packet: seq={}", seq);
                }
            }
        }

        self.estimator.update(packet.timestamp, arrival);
    }

    /// Record an arriving RTCP sender report from this source.
    ///
    /// Only the last-SR reference for round-trip measurement is
    /// updated; loss interval state is untouched.
    pub fn on_receive_sr(&mut self, sr: &SenderReportInfo, arrival: ClockSample) {
        self.last_sr_ntp = sr.ntp.to_u32();
        self.last_sr_arrival = Some(arrival);
        trace!(ssrc = self.ssrc, "Sender report received");
    }

    /// Highest sequence number received, extended with the wraparound
    /// cycle count
    pub fn extended_highest_sequence(&self) -> u64 {
        match self.highest_sequence {
            Some(highest) => self.sequence_cycles + highest as u64,
            None => 0,
        }
    }

    /// Number of packets the source has sent, inferred from the
    /// sequence number range
    pub fn expected_packets(&self) -> u64 {
        match self.base_sequence {
            Some(base) => self.extended_highest_sequence() + 1 - base as u64,
            None => 0,
        }
    }

    /// Cumulative packets lost.
    ///
    /// Duplicates and late arrivals still count as received, so a
    /// burst of duplicates can make this smaller than the true loss;
    /// saturation keeps it from going negative.
    pub fn packets_lost(&self) -> u64 {
        self.expected_packets().saturating_sub(self.packets_received)
    }

    /// Total packets received from this source
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Total payload octets received from this source
    pub fn octets_received(&self) -> u64 {
        self.octets_received
    }

    /// Packets that arrived from behind the highest sequence seen
    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Current interarrival jitter estimate in RTP timestamp units
    pub fn jitter(&self) -> u32 {
        self.estimator.jitter_units().max(0) as u32
    }

    /// Fraction of packets lost over the current report interval, on
    /// the 0..=255 scale of RFC 3550 Section 6.4.1
    pub fn fraction_lost(&self) -> u8 {
        let expected_interval = self
            .expected_packets()
            .saturating_sub(self.expected_at_last_report);
        if expected_interval == 0 {
            return 0;
        }
        let lost_interval = expected_interval.saturating_sub(self.received_since_report);
        ((lost_interval * 256) / expected_interval).min(255) as u8
    }

    /// Delay since the last sender report in 1/65536 second units, or
    /// zero if no sender report has been received
    pub fn last_sr_delay(&self, now: ClockSample) -> u32 {
        match self.last_sr_arrival {
            Some(arrival) => {
                let ticks = now.saturating_ticks_since(arrival) as u128;
                ((ticks << 16) / now.rate() as u128) as u32
            }
            None => 0,
        }
    }

    /// Build the report block for this source and start a new report
    /// interval.
    ///
    /// Generating the block is what resets the loss fraction baseline,
    /// so callers should build it exactly once per outgoing report.
    pub fn report_block(&mut self, now: ClockSample) -> ReportBlockData {
        let block = ReportBlockData {
            ssrc: self.ssrc,
            fraction_lost: self.fraction_lost(),
            cumulative_lost: self.packets_lost(),
            extended_highest_sequence: self.extended_highest_sequence(),
            interarrival_jitter: self.jitter(),
            last_sr: self.last_sr_ntp,
            delay_since_last_sr: self.last_sr_delay(now),
        };

        self.expected_at_last_report = self.expected_packets();
        self.received_since_report = 0;
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::NtpTimestamp;

    const RATE: u32 = 8000;
    const SSRC: RtpSsrc = 0xCAFE_F00D;

    // Set up a simple test logger
    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn at_ms(ms: u64) -> ClockSample {
        ClockSample::new(ms * (RATE as u64) / 1000, RATE)
    }

    fn packet(seq: u16, ts: u32) -> RtpPacketView<'static> {
        RtpPacketView {
            sequence_number: seq,
            timestamp: ts,
            ssrc: SSRC,
            payload_type: 0,
            marker: false,
            payload: &[0u8; 160],
        }
    }

    fn feed(stats: &mut MemberStatistics, sequences: &[u16]) {
        for (i, &seq) in sequences.iter().enumerate() {
            stats.on_receive_rtp(&packet(seq, seq as u32 * 160), at_ms(i as u64 * 20));
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 2, 3]);

        assert_eq!(stats.packets_received(), 3);
        assert_eq!(stats.octets_received(), 480);
        assert_eq!(stats.extended_highest_sequence(), 3);
        assert_eq!(stats.packets_lost(), 0);
    }

    #[test]
    fn test_gap_counts_as_loss() {
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 2, 3, 5]);

        // Sequence 4 never arrived: 5 expected, 4 received
        assert_eq!(stats.expected_packets(), 5);
        assert_eq!(stats.packets_lost(), 1);
    }

    #[test]
    fn test_sequence_wraparound_extends() {
        init_test_logging();
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[65534, 65535, 0, 1]);

        assert_eq!(stats.extended_highest_sequence(), 65536 + 1);
        assert_eq!(stats.expected_packets(), 4);
        assert_eq!(stats.packets_lost(), 0);
    }

    #[test]
    fn test_reorder_does_not_regress_highest() {
        init_test_logging();
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 2, 4, 3]);

        assert_eq!(stats.extended_highest_sequence(), 4);
        assert_eq!(stats.out_of_order(), 1);
        assert_eq!(stats.packets_lost(), 0);
    }

    #[test]
    fn test_fraction_lost_interval() {
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 2, 3, 4]);

        // First interval: nothing lost
        let block = stats.report_block(at_ms(80));
        assert_eq!(block.fraction_lost, 0);
        assert_eq!(block.cumulative_lost, 0);

        // Second interval: 4 expected (5..=8), 2 received
        stats.on_receive_rtp(&packet(5, 800), at_ms(100));
        stats.on_receive_rtp(&packet(8, 1280), at_ms(160));
        let block = stats.report_block(at_ms(200));
        assert_eq!(block.fraction_lost, 128);
        assert_eq!(block.cumulative_lost, 2);

        // Third interval with no traffic reports zero, not stale loss
        let block = stats.report_block(at_ms(400));
        assert_eq!(block.fraction_lost, 0);
        assert_eq!(block.cumulative_lost, 2);
    }

    #[test]
    fn test_sender_report_does_not_reset_interval() {
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 3]);

        let sr = SenderReportInfo {
            ssrc: SSRC,
            ntp: NtpTimestamp {
                seconds: 0x1234_5678,
                fraction: 0x9ABC_DEF0,
            },
            rtp_timestamp: 480,
            packet_count: 2,
            octet_count: 320,
        };
        stats.on_receive_sr(&sr, at_ms(40));

        // Loss over the interval is still visible after the SR
        let block = stats.report_block(at_ms(60));
        assert_eq!(block.fraction_lost, 85); // 1 of 3, floor(256/3)
        assert_eq!(block.last_sr, 0x5678_9ABC);
    }

    #[test]
    fn test_last_sr_delay_units() {
        let mut stats = MemberStatistics::new(SSRC);
        let sr = SenderReportInfo {
            ssrc: SSRC,
            ntp: NtpTimestamp::now(),
            rtp_timestamp: 0,
            packet_count: 0,
            octet_count: 0,
        };
        stats.on_receive_sr(&sr, at_ms(1000));

        // 500ms elapsed = 0.5s = 32768 in 1/65536s units
        assert_eq!(stats.last_sr_delay(at_ms(1500)), 32768);
    }

    #[test]
    fn test_no_sender_report_yields_zeros() {
        let mut stats = MemberStatistics::new(SSRC);
        feed(&mut stats, &[1, 2]);

        let block = stats.report_block(at_ms(40));
        assert_eq!(block.last_sr, 0);
        assert_eq!(block.delay_since_last_sr, 0);
    }

    #[test]
    fn test_jitter_flows_into_report() {
        let mut stats = MemberStatistics::new(SSRC);
        let arrivals = [0u64, 20, 50, 70, 100];
        for (i, &ms) in arrivals.iter().enumerate() {
            stats.on_receive_rtp(&packet(i as u16 + 1, (i as u32 + 1) * 160), at_ms(ms));
        }

        assert_eq!(stats.jitter(), 9);
        assert_eq!(stats.report_block(at_ms(120)).interarrival_jitter, 9);
    }
}
