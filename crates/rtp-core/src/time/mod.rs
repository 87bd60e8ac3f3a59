//! Time and clock utilities for the RTP transport
//!
//! Media timing inside the transport core is expressed in RTP
//! timestamp units at a fixed clock rate. A [`MediaClock`] anchors a
//! monotonic instant for one session and issues [`ClockSample`]s; the
//! rate never changes for the lifetime of a session.

use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Typical clock rates for common audio codecs
pub mod clock_rates {
    /// G.711, G.726, G.729 (8kHz)
    pub const AUDIO_8KHZ: u32 = 8000;

    /// G.722 (16kHz)
    pub const AUDIO_16KHZ: u32 = 16000;

    /// Opus, AAC (48kHz)
    pub const AUDIO_48KHZ: u32 = 48000;
}

/// A monotonic point in time, counted in RTP timestamp units.
///
/// `ticks` is the number of timestamp units elapsed since the owning
/// clock's origin at `rate` units per second. Samples from clocks with
/// different rates must never be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockSample {
    ticks: u64,
    rate: u32,
}

impl ClockSample {
    /// Create a sample from a raw tick count at the given rate.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is zero. A zero clock rate is a wiring bug,
    /// not a runtime condition.
    pub fn new(ticks: u64, rate: u32) -> Self {
        assert!(rate > 0, "clock rate must be positive");
        Self { ticks, rate }
    }

    /// Create a sample from the wall-clock time elapsed since the
    /// clock origin.
    pub fn from_duration(elapsed: Duration, rate: u32) -> Self {
        Self::new(duration_to_ticks(elapsed, rate), rate)
    }

    /// Elapsed timestamp units since the clock origin.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Timestamp units per second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Wall-clock equivalent of this sample.
    pub fn as_duration(&self) -> Duration {
        ticks_to_duration(self.ticks, self.rate)
    }

    /// Milliseconds since the clock origin.
    pub fn as_millis(&self) -> u64 {
        self.as_duration().as_millis() as u64
    }

    /// Ticks elapsed since `earlier`, zero if `earlier` is ahead.
    pub fn saturating_ticks_since(&self, earlier: ClockSample) -> u64 {
        debug_assert_eq!(self.rate, earlier.rate, "mixed clock rates");
        self.ticks.saturating_sub(earlier.ticks)
    }

    /// This sample advanced by `ticks` timestamp units.
    pub fn plus_ticks(&self, ticks: u64) -> ClockSample {
        Self {
            ticks: self.ticks.saturating_add(ticks),
            rate: self.rate,
        }
    }
}

/// Monotonic media clock for a single RTP session.
///
/// Wraps a [`std::time::Instant`] origin so that samples are immune to
/// wall-clock adjustments. The rate is fixed at construction;
/// conversions stay consistent for the whole session.
#[derive(Debug, Clone, Copy)]
pub struct MediaClock {
    rate: u32,
    origin: Instant,
}

impl MediaClock {
    /// Create a clock ticking at `rate` timestamp units per second.
    pub fn new(rate: u32) -> Result<Self> {
        if rate == 0 {
            return Err(Error::InvalidParameter(
                "clock rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            rate,
            origin: Instant::now(),
        })
    }

    /// Timestamp units per second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// The current time as a [`ClockSample`].
    pub fn now(&self) -> ClockSample {
        ClockSample::from_duration(self.origin.elapsed(), self.rate)
    }
}

/// Convert an RTP timestamp to a duration at a given clock rate
pub fn rtp_timestamp_to_duration(timestamp: u32, clock_rate: u32) -> Duration {
    if clock_rate == 0 {
        return Duration::from_secs(0);
    }
    ticks_to_duration(timestamp as u64, clock_rate)
}

/// Convert a duration to an RTP timestamp at a given clock rate
pub fn duration_to_rtp_timestamp(duration: Duration, clock_rate: u32) -> u32 {
    duration_to_ticks(duration, clock_rate) as u32
}

/// Absolute difference between two RTP timestamps, handling wraparound
///
/// Returns the shorter distance around the 32-bit timestamp circle.
pub fn rtp_timestamp_diff(a: u32, b: u32) -> u32 {
    let forward = a.wrapping_sub(b);
    let backward = b.wrapping_sub(a);
    forward.min(backward)
}

fn duration_to_ticks(duration: Duration, rate: u32) -> u64 {
    let whole = duration.as_secs() * rate as u64;
    let frac = (duration.subsec_nanos() as u64 * rate as u64) / 1_000_000_000;
    whole + frac
}

fn ticks_to_duration(ticks: u64, rate: u32) -> Duration {
    let seconds = ticks / rate as u64;
    let remainder = ticks % rate as u64;
    let nanos = (remainder * 1_000_000_000) / rate as u64;
    Duration::new(seconds, nanos as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion() {
        // 125ms = 1000 samples at 8kHz
        let duration = Duration::from_millis(125);
        let timestamp = duration_to_rtp_timestamp(duration, 8000);
        assert_eq!(timestamp, 1000);

        let converted = rtp_timestamp_to_duration(timestamp, 8000);
        assert_eq!(converted.as_millis(), 125);

        // 1s = 48000 samples at 48kHz
        let timestamp = duration_to_rtp_timestamp(Duration::from_secs(1), 48000);
        assert_eq!(timestamp, 48000);
    }

    #[test]
    fn test_timestamp_diff() {
        assert_eq!(rtp_timestamp_diff(1000, 2000), 1000);
        assert_eq!(rtp_timestamp_diff(2000, 1000), 1000);

        // Wraparound cases
        assert_eq!(rtp_timestamp_diff(0xFFFFFFFF, 10), 11);
        assert_eq!(rtp_timestamp_diff(10, 0xFFFFFFFF), 11);

        // Large differences that aren't wraparounds
        assert_eq!(rtp_timestamp_diff(1, 0x70000000), 0x70000000 - 1);
        assert_eq!(rtp_timestamp_diff(0x70000000, 1), 0x70000000 - 1);
    }

    #[test]
    fn test_clock_rejects_zero_rate() {
        assert!(MediaClock::new(0).is_err());
        assert!(MediaClock::new(8000).is_ok());
    }

    #[test]
    fn test_clock_sample_accessors() {
        let sample = ClockSample::new(16000, 8000);
        assert_eq!(sample.as_millis(), 2000);
        assert_eq!(sample.as_duration(), Duration::from_secs(2));
        assert_eq!(sample.plus_ticks(8000).as_millis(), 3000);

        let earlier = ClockSample::new(8000, 8000);
        assert_eq!(sample.saturating_ticks_since(earlier), 8000);
        assert_eq!(earlier.saturating_ticks_since(sample), 0);
    }

    #[test]
    fn test_clock_monotonic() {
        let clock = MediaClock::new(8000).unwrap();
        let a = clock.now();
        let b = clock.now();
        assert!(b.ticks() >= a.ticks());
        assert_eq!(a.rate(), 8000);
    }

    #[test]
    #[should_panic(expected = "clock rate must be positive")]
    fn test_sample_rejects_zero_rate() {
        let _ = ClockSample::new(0, 0);
    }
}
