//! Interrupt-fed tachometer edge register.
//!
//! Each fan has one [`EdgeTimer`] written from its edge interrupt and read once
//! per control tick. The timestamp and interval of the latest edge share one
//! 64-bit atomic word, so the tick never observes an interval paired with the
//! wrong timestamp.

use portable_atomic::{AtomicU64, Ordering};

/// Interval reported before two edges have been captured.
pub const STALLED_INTERVAL_US: u32 = u32::MAX;

/// Snapshot of the most recent edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeSample {
    /// Timestamp of the last edge (µs, wrapping).
    pub last_edge_us: u32,
    /// Tach period derived from the last two edges (µs).
    pub interval_us: u32,
}

impl EdgeSample {
    /// Sample reported by a channel that has never seen an edge.
    pub const STALLED: Self = Self {
        last_edge_us: 0,
        interval_us: STALLED_INTERVAL_US,
    };

    #[allow(clippy::cast_lossless)]
    const fn pack(self) -> u64 {
        ((self.last_edge_us as u64) << 32) | self.interval_us as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn unpack(word: u64) -> Self {
        Self {
            last_edge_us: (word >> 32) as u32,
            interval_us: word as u32,
        }
    }
}

/// Single-producer, single-consumer edge register for one fan.
pub struct EdgeTimer {
    word: AtomicU64,
    edges_per_period: u32,
}

impl EdgeTimer {
    /// Creates a register for a sensor that toggles `edges_per_period` times per
    /// tach period. Capturing both edges of a square wave means two.
    #[must_use]
    pub const fn new(edges_per_period: u32) -> Self {
        Self {
            word: AtomicU64::new(EdgeSample::STALLED.pack()),
            edges_per_period,
        }
    }

    /// Records an edge observed at `now_us`. Intended for interrupt context.
    pub fn record(&self, now_us: u32) {
        let previous = EdgeSample::unpack(self.word.load(Ordering::Acquire));
        // The first edge only arms the timer.
        let interval_us = if previous == EdgeSample::STALLED {
            STALLED_INTERVAL_US
        } else {
            now_us
                .wrapping_sub(previous.last_edge_us)
                .saturating_mul(self.edges_per_period)
        };
        let next = EdgeSample {
            last_edge_us: now_us,
            interval_us,
        };
        self.word.store(next.pack(), Ordering::Release);
    }

    /// Returns the latest edge timestamp and interval as one consistent pair.
    pub fn sample(&self) -> EdgeSample {
        EdgeSample::unpack(self.word.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stalled() {
        let timer = EdgeTimer::new(2);
        assert_eq!(timer.sample(), EdgeSample::STALLED);
    }

    #[test]
    fn interval_scales_half_periods() {
        let timer = EdgeTimer::new(2);
        timer.record(1_000);
        timer.record(6_000);

        let sample = timer.sample();
        assert_eq!(sample.last_edge_us, 6_000);
        assert_eq!(sample.interval_us, 10_000);
    }

    #[test]
    fn interval_survives_timestamp_wrap() {
        let timer = EdgeTimer::new(1);
        timer.record(u32::MAX - 99);
        timer.record(400);
        assert_eq!(timer.sample().interval_us, 500);
    }

    #[test]
    fn first_edge_only_arms() {
        let timer = EdgeTimer::new(2);
        timer.record(300);
        assert_eq!(timer.sample().interval_us, STALLED_INTERVAL_US);
        assert_eq!(timer.sample().last_edge_us, 300);
    }
}
