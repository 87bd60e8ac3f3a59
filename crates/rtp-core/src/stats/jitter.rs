//! Interarrival jitter estimation (RFC 3550 Appendix A.8)

use crate::time::ClockSample;
use crate::RtpTimestamp;

/// Recursive interarrival jitter estimator.
///
/// The accumulator is kept in Q4 fixed point exactly as RFC 3550
/// recommends: the stored value is 16x the jitter in RTP timestamp
/// units, and each arrival moves it 1/16th of the way toward the
/// latest transit-time difference. Arrival times must come from the
/// session media clock so that both deltas share a unit.
#[derive(Debug, Clone, Default)]
pub struct JitterEstimator {
    jitter_q4: i64,
    last: Option<(RtpTimestamp, u64)>,
}

impl JitterEstimator {
    /// Create an estimator with a zero baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet arrival into the recursion.
    ///
    /// The first packet only establishes the baseline. Returns the
    /// updated estimate in RTP timestamp units.
    pub fn update(&mut self, timestamp: RtpTimestamp, arrival: ClockSample) -> i64 {
        if let Some((last_ts, last_arrival)) = self.last {
            let arrival_delta = arrival.ticks().wrapping_sub(last_arrival) as i64;
            // Wrap-aware signed RTP timestamp delta
            let ts_delta = timestamp.wrapping_sub(last_ts) as i32 as i64;
            let d = (arrival_delta - ts_delta).abs();
            self.jitter_q4 += d - ((self.jitter_q4 + 8) >> 4);
        }
        self.last = Some((timestamp, arrival.ticks()));
        self.jitter_units()
    }

    /// Current estimate in RTP timestamp units.
    pub fn jitter_units(&self) -> i64 {
        self.jitter_q4 >> 4
    }

    /// Raw Q4 accumulator (16x the estimate) for report builders that
    /// want the unrounded state.
    pub fn jitter_q4(&self) -> i64 {
        self.jitter_q4
    }

    /// Clear the estimate and the baseline
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_ms(ms: u64) -> ClockSample {
        // 8kHz: 8 ticks per millisecond
        ClockSample::new(ms * 8, 8000)
    }

    #[test]
    fn test_known_jitter_sequence() {
        // 20ms frames at 8kHz; arrivals at 0, 20, 50, 70, 100ms give
        // transit differences of 0, 80, 0, 80 timestamp units.
        let mut estimator = JitterEstimator::new();

        assert_eq!(estimator.update(160, at_ms(0)), 0);
        assert_eq!(estimator.update(320, at_ms(20)), 0);
        assert_eq!(estimator.update(480, at_ms(50)), 5);
        assert_eq!(estimator.update(640, at_ms(70)), 4);
        assert_eq!(estimator.update(800, at_ms(100)), 9);
    }

    #[test]
    fn test_steady_stream_has_zero_jitter() {
        let mut estimator = JitterEstimator::new();
        for i in 0..50u64 {
            estimator.update((i * 160) as u32, at_ms(i * 20));
        }
        assert_eq!(estimator.jitter_units(), 0);
        assert_eq!(estimator.jitter_q4(), 0);
    }

    #[test]
    fn test_estimate_never_negative() {
        let mut estimator = JitterEstimator::new();
        estimator.update(160, at_ms(0));
        estimator.update(320, at_ms(45));
        // Steady cadence afterwards lets the estimate decay toward zero
        for i in 2..100u64 {
            estimator.update((i as u32 + 1) * 160, at_ms(i * 20 + 5));
            assert!(estimator.jitter_q4() >= 0);
        }
    }

    #[test]
    fn test_timestamp_wraparound() {
        let mut estimator = JitterEstimator::new();
        // Timestamps crossing the 2^32 boundary on a steady stream
        estimator.update(u32::MAX - 159, at_ms(0));
        estimator.update(0, at_ms(20));
        estimator.update(160, at_ms(40));
        assert_eq!(estimator.jitter_units(), 0);
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut estimator = JitterEstimator::new();
        estimator.update(160, at_ms(0));
        estimator.update(320, at_ms(60));
        assert!(estimator.jitter_q4() > 0);

        estimator.reset();
        assert_eq!(estimator.jitter_q4(), 0);
        // First packet after reset re-establishes the baseline
        assert_eq!(estimator.update(480, at_ms(100)), 0);
    }
}
