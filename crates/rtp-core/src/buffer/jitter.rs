//! Receive jitter buffer for RTP packet reordering
//!
//! Absorbs network delay variance by holding arriving packets briefly
//! and releasing them in sequence order once their playout delay has
//! elapsed. The buffer is driven entirely by explicit [`ClockSample`]s
//! from the session media clock: `write` is called by the network
//! receive path, `read` by the scheduler tick, and neither ever
//! blocks.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::pool::{FramePool, PooledFrame};
use crate::packet::RtpPacketView;
use crate::stats::JitterEstimator;
use crate::time::ClockSample;
use crate::{RtpSequenceNumber, RtpTimestamp};

/// Default playout delay in milliseconds
pub const DEFAULT_PLAYOUT_DELAY_MS: u32 = 60;

/// Default maximum number of buffered packets
pub const DEFAULT_MAX_PACKETS: usize = 100;

/// Default sequence span (in packets) before a gap is treated as a
/// stream discontinuity
pub const DEFAULT_MAX_SPAN_PACKETS: u64 = 512;

/// Default samples per frame (20ms of narrowband audio)
pub const DEFAULT_SAMPLES_PER_FRAME: u32 = 160;

/// Forward sequence steps below this are in-order progress; at or
/// above it the packet is treated as arriving from behind the highest
/// sequence seen. Half the 16-bit sequence space, per RFC 3550.
const SEQ_FORWARD_THRESHOLD: u16 = 0x8000;

/// Jitter buffer configuration
#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    /// Clock rate in Hz
    pub clock_rate: u32,

    /// Playout delay applied to every packet, in milliseconds
    pub playout_delay_ms: u32,

    /// Maximum number of packets held at once
    pub max_packets: usize,

    /// Sequence span beyond which a gap is a discontinuity; older
    /// entries are flushed instead of waited on
    pub max_span_packets: u64,

    /// Frame duration in timestamp units for the negotiated codec
    pub samples_per_frame: u32,

    /// Frame capacity of the internal pool in bytes
    pub max_payload_size: usize,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            clock_rate: 8000,
            playout_delay_ms: DEFAULT_PLAYOUT_DELAY_MS,
            max_packets: DEFAULT_MAX_PACKETS,
            max_span_packets: DEFAULT_MAX_SPAN_PACKETS,
            samples_per_frame: DEFAULT_SAMPLES_PER_FRAME,
            max_payload_size: super::pool::DEFAULT_FRAME_CAPACITY,
        }
    }
}

/// Counters for jitter buffer activity
#[derive(Debug, Clone, Default)]
pub struct JitterBufferStats {
    /// Total packets offered to `write`
    pub packets_received: u64,

    /// Frames handed to the consumer
    pub frames_played: u64,

    /// Packets that arrived after their playout point had passed
    pub dropped_late: u64,

    /// Packets with a sequence number already buffered
    pub duplicates: u64,

    /// Entries flushed by a discontinuity
    pub dropped_flushed: u64,

    /// Entries evicted because the buffer was full
    pub dropped_overflow: u64,

    /// Sequence gaps observed at read-out
    pub discontinuities: u64,

    /// Packets currently buffered
    pub buffered_packets: usize,
}

/// One playable frame handed out of the jitter buffer.
///
/// Ownership of the payload transfers to the caller; dropping the
/// frame recycles its storage into the buffer's pool.
#[derive(Debug)]
pub struct Frame {
    /// Wire sequence number of the originating packet
    pub sequence_number: RtpSequenceNumber,

    /// RTP timestamp of the originating packet
    pub timestamp: RtpTimestamp,

    /// Marker bit from the originating packet
    pub marker: bool,

    /// Frame duration in timestamp units (fixed per codec)
    pub duration_ticks: u32,

    /// Payload bytes
    pub payload: PooledFrame,
}

struct Entry {
    sequence_number: RtpSequenceNumber,
    timestamp: RtpTimestamp,
    marker: bool,
    arrival: ClockSample,
    payload: PooledFrame,
}

/// Reordering buffer for one receive direction of an RTP session.
///
/// Packets are keyed by a 64-bit extended sequence number so that the
/// 16-bit wire sequence wrapping at 65536 never looks like massive
/// reordering. The single writer is the network receive path; the
/// single reader is the scheduler tick.
pub struct JitterBuffer {
    config: JitterBufferConfig,
    entries: BTreeMap<u64, Entry>,
    pool: FramePool,
    estimator: JitterEstimator,

    /// Extended-sequence high bits, in units of 65536
    cycles: u64,
    highest_seq: Option<RtpSequenceNumber>,

    /// Extended sequence of the next frame owed to the reader
    read_cursor: Option<u64>,

    playout_delay_ticks: u64,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    /// Create a buffer with its own frame pool sized from the config
    pub fn new(config: JitterBufferConfig) -> Self {
        // One pool frame per buffer slot plus slack for frames still
        // held by the consumer
        let pool = FramePool::new(config.max_packets * 2, config.max_payload_size);
        Self::with_pool(config, pool)
    }

    /// Create a buffer backed by an existing frame pool
    pub fn with_pool(config: JitterBufferConfig, pool: FramePool) -> Self {
        let playout_delay_ticks =
            (config.playout_delay_ms as u64 * config.clock_rate as u64) / 1000;
        Self {
            config,
            entries: BTreeMap::new(),
            pool,
            estimator: JitterEstimator::new(),
            cycles: 0,
            highest_seq: None,
            read_cursor: None,
            playout_delay_ticks,
            stats: JitterBufferStats::default(),
        }
    }

    /// Insert one arriving packet.
    ///
    /// Returns `true` if the packet was buffered. Late packets and
    /// duplicates are dropped and counted; a sequence gap wider than
    /// `max_span_packets` flushes the stale tail of the buffer.
    pub fn write(&mut self, packet: &RtpPacketView<'_>, arrival: ClockSample) -> bool {
        self.stats.packets_received += 1;

        let ext = match self.extend_sequence(packet.sequence_number) {
            Some(ext) => ext,
            None => {
                // Precedes the first sequence cycle entirely
                self.stats.dropped_late += 1;
                trace!("Packet too late: seq={}", packet.sequence_number);
                return false;
            }
        };

        if let Some(cursor) = self.read_cursor {
            if ext < cursor {
                self.stats.dropped_late += 1;
                trace!(
                    "Packet too late: seq={}, playout cursor={}",
                    packet.sequence_number,
                    cursor
                );
                return false;
            }
        }

        if self.entries.contains_key(&ext) {
            self.stats.duplicates += 1;
            trace!("Duplicate packet with seq={}", packet.sequence_number);
            return false;
        }

        self.estimator.update(packet.timestamp, arrival);

        // A gap wider than the configured span is a discontinuity:
        // flush the stale tail rather than waiting on it forever
        if let Some((&oldest, _)) = self.entries.iter().next() {
            if ext.saturating_sub(oldest) > self.config.max_span_packets {
                let cutoff = ext - self.config.max_span_packets;
                let flushed = self.flush_older_than(cutoff);
                self.stats.dropped_flushed += flushed;
                self.stats.discontinuities += 1;
                debug!(
                    "Sequence discontinuity at seq={}, flushed {} stale entries",
                    packet.sequence_number, flushed
                );
            }
        }

        // Bounded buffer: evict the oldest entry when full
        if self.entries.len() >= self.config.max_packets {
            if let Some((&oldest, _)) = self.entries.iter().next() {
                self.entries.remove(&oldest);
                self.stats.dropped_overflow += 1;
                debug!("Jitter buffer full, dropped oldest entry");
            }
        }

        let mut payload = self.pool.take();
        payload.extend_from_slice(packet.payload);
        self.entries.insert(
            ext,
            Entry {
                sequence_number: packet.sequence_number,
                timestamp: packet.timestamp,
                marker: packet.marker,
                arrival,
                payload,
            },
        );
        self.stats.buffered_packets = self.entries.len();
        true
    }

    /// Return the next in-order frame once its playout delay has
    /// elapsed, or `None` if the buffer is empty or nothing is due.
    ///
    /// Missing sequence numbers are skipped, not waited on: when the
    /// oldest buffered packet is due it plays regardless of gaps
    /// before it.
    pub fn read(&mut self, now: ClockSample) -> Option<Frame> {
        let due = {
            let (_, entry) = self.entries.iter().next()?;
            entry.arrival.ticks() + self.playout_delay_ticks
        };
        if now.ticks() < due {
            return None;
        }

        let (ext, entry) = self.entries.pop_first()?;
        if let Some(cursor) = self.read_cursor {
            if ext > cursor {
                self.stats.discontinuities += 1;
                debug!("Packet loss detected, skipping to seq={}", entry.sequence_number);
            }
        }
        self.read_cursor = Some(ext + 1);
        self.stats.frames_played += 1;
        self.stats.buffered_packets = self.entries.len();

        Some(Frame {
            sequence_number: entry.sequence_number,
            timestamp: entry.timestamp,
            marker: entry.marker,
            duration_ticks: self.config.samples_per_frame,
            payload: entry.payload,
        })
    }

    /// Clear all buffered state and counters.
    ///
    /// Used on stream restart, e.g. when the remote SSRC changes.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.estimator.reset();
        self.cycles = 0;
        self.highest_seq = None;
        self.read_cursor = None;
        self.stats = JitterBufferStats::default();
        debug!("Jitter buffer reset");
    }

    /// Total packets dropped (late, flushed and overflow)
    pub fn get_dropped(&self) -> u64 {
        self.stats.dropped_late + self.stats.dropped_flushed + self.stats.dropped_overflow
    }

    /// Current interarrival jitter estimate in RTP timestamp units
    pub fn get_estimated_jitter(&self) -> i64 {
        self.estimator.jitter_units()
    }

    /// Copy of the activity counters
    pub fn stats(&self) -> JitterBufferStats {
        self.stats.clone()
    }

    /// Number of packets currently buffered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Map a 16-bit wire sequence number onto the 64-bit extended
    /// sequence space.
    ///
    /// A forward step smaller than half the sequence space advances
    /// the highest-seen sequence; a numeric decrease on such a step is
    /// a wraparound and bumps the cycle count. Anything else is a
    /// packet from behind the highest sequence and keeps its original
    /// cycle. `None` means the packet precedes the very first cycle.
    fn extend_sequence(&mut self, seq: RtpSequenceNumber) -> Option<u64> {
        let highest = match self.highest_seq {
            None => {
                self.highest_seq = Some(seq);
                return Some(seq as u64);
            }
            Some(highest) => highest,
        };

        let forward = seq.wrapping_sub(highest);
        if forward != 0 && forward < SEQ_FORWARD_THRESHOLD {
            if seq < highest {
                self.cycles += 1 << 16;
                debug!("Sequence wraparound: {} -> {}", highest, seq);
            }
            self.highest_seq = Some(seq);
            Some(self.cycles + seq as u64)
        } else if seq > highest {
            // Behind the highest but numerically larger: sent before
            // the most recent wraparound
            self.cycles.checked_sub(1 << 16).map(|c| c + seq as u64)
        } else {
            Some(self.cycles + seq as u64)
        }
    }

    /// Remove all entries below `cutoff`, returning how many were
    /// flushed.
    fn flush_older_than(&mut self, cutoff: u64) -> u64 {
        let keep = self.entries.split_off(&cutoff);
        let flushed = self.entries.len() as u64;
        self.entries = keep;
        flushed
    }
}

impl std::fmt::Debug for JitterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitterBuffer")
            .field("buffered", &self.entries.len())
            .field("read_cursor", &self.read_cursor)
            .field("highest_seq", &self.highest_seq)
            .finish()
    }
}
