//! Fan speed estimation from tachometer edge timing.

use crate::config::{MAX_MEASURABLE_RPM, MIN_MEASURABLE_RPM};
use crate::edge::EdgeSample;

/// Microseconds per minute.
const MICROS_PER_MINUTE: u32 = 60_000_000;

/// Fixed-point scale of the low-pass filter gain.
pub const FILTER_SCALE: u32 = 1024;
const FILTER_SHIFT: u32 = 10;

/// Static tachometer characteristics of a fan channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeedConfig {
    /// Tach pulses emitted per revolution.
    pub pulses_per_rev: u32,
    /// Slowest speed still reported as motion.
    pub min_rpm: u32,
    /// Ceiling applied to raw readings.
    pub max_rpm: u32,
}

impl SpeedConfig {
    /// Interval at or above which the fan is considered stopped.
    #[must_use]
    pub const fn stall_threshold_us(&self) -> u32 {
        (1_000_000 / self.min_rpm) * 60 / self.pulses_per_rev
    }
}

impl Default for SpeedConfig {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn default() -> Self {
        Self {
            pulses_per_rev: 2,
            min_rpm: MIN_MEASURABLE_RPM as u32,
            max_rpm: MAX_MEASURABLE_RPM as u32,
        }
    }
}

/// Converts edge samples into a filtered RPM reading.
///
/// Filter state survives mode changes; only [`reset`](Self::reset) clears it.
#[derive(Clone, Debug)]
pub struct SpeedEstimator {
    config: SpeedConfig,
    raw_rpm: u16,
    filtered_rpm: u16,
    stale_edge: Option<u32>,
}

impl SpeedEstimator {
    /// Creates an estimator reporting 0 RPM.
    #[must_use]
    pub const fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            raw_rpm: 0,
            filtered_rpm: 0,
            stale_edge: None,
        }
    }

    /// Tachometer characteristics in use.
    #[must_use]
    pub const fn config(&self) -> SpeedConfig {
        self.config
    }

    /// Unfiltered speed from the last call to [`measure`](Self::measure).
    #[must_use]
    pub const fn raw_rpm(&self) -> u16 {
        self.raw_rpm
    }

    /// Filtered speed from the last call to [`measure`](Self::measure).
    #[must_use]
    pub const fn rpm(&self) -> u16 {
        self.filtered_rpm
    }

    /// Folds one edge sample taken at `now_us` into the filtered speed.
    ///
    /// `filter_gain` is the weight (out of [`FILTER_SCALE`]) kept from the
    /// previous reading.
    pub fn measure(&mut self, sample: EdgeSample, now_us: u32, filter_gain: u16) -> u16 {
        self.raw_rpm = self.instantaneous(sample, now_us);

        let gain = u32::from(filter_gain).min(FILTER_SCALE);
        let blended = (u32::from(self.filtered_rpm) * gain
            + u32::from(self.raw_rpm) * (FILTER_SCALE - gain))
            >> FILTER_SHIFT;
        self.filtered_rpm = u16::try_from(blended).unwrap_or(u16::MAX);
        self.filtered_rpm
    }

    /// Drops filter history and any stall latch.
    pub fn reset(&mut self) {
        self.raw_rpm = 0;
        self.filtered_rpm = 0;
        self.stale_edge = None;
    }

    fn instantaneous(&mut self, sample: EdgeSample, now_us: u32) -> u16 {
        let threshold = self.config.stall_threshold_us();

        if self.stale_edge == Some(sample.last_edge_us) {
            return 0;
        }
        self.stale_edge = None;

        let since_edge = now_us.wrapping_sub(sample.last_edge_us);
        if since_edge > threshold {
            // Latch so the elapsed time cannot wrap back under the threshold.
            self.stale_edge = Some(sample.last_edge_us);
            return 0;
        }
        if sample.interval_us >= threshold {
            return 0;
        }

        let rpm = MICROS_PER_MINUTE
            .checked_div(sample.interval_us)
            .map_or(self.config.max_rpm, |per_minute| {
                per_minute / self.config.pulses_per_rev
            })
            .min(self.config.max_rpm);
        u16::try_from(rpm).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(last_edge_us: u32, interval_us: u32) -> EdgeSample {
        EdgeSample {
            last_edge_us,
            interval_us,
        }
    }

    #[test]
    fn default_threshold_matches_fifty_rpm() {
        assert_eq!(SpeedConfig::default().stall_threshold_us(), 600_000);
    }

    #[test]
    fn unfiltered_reading_follows_interval() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        // 20 ms tach period at two pulses per revolution is 1500 RPM.
        assert_eq!(estimator.measure(sample(1_000, 20_000), 5_000, 0), 1_500);
    }

    #[test]
    fn readings_clamp_to_maximum() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        assert_eq!(estimator.measure(sample(1_000, 100), 1_100, 0), 9_999);
        assert_eq!(estimator.measure(sample(1_000, 0), 1_100, 0), 9_999);
    }

    #[test]
    fn long_interval_reads_as_stopped() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        assert_eq!(estimator.measure(sample(0, 600_000), 10, 0), 0);
        assert_eq!(estimator.measure(EdgeSample::STALLED, 10, 0), 0);
    }

    #[test]
    fn stall_needs_silence_beyond_threshold() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        assert_eq!(estimator.measure(sample(0, 20_000), 600_000, 0), 1_500);
        assert_eq!(estimator.measure(sample(0, 20_000), 600_001, 0), 0);
    }

    #[test]
    fn silent_sensor_reads_as_stopped() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        assert_eq!(estimator.measure(sample(0, 20_000), 700_000, 0), 0);
        // Wrapped clock lands near the old edge again; the latch keeps it stopped.
        assert_eq!(estimator.measure(sample(0, 20_000), 5, 0), 0);
        // A fresh edge releases the latch.
        assert_eq!(estimator.measure(sample(20, 20_000), 40, 0), 1_500);
    }

    #[test]
    fn filter_blends_previous_reading() {
        let mut estimator = SpeedEstimator::new(SpeedConfig::default());
        // Half weight on history: (0 * 512 + 1500 * 512) >> 10.
        assert_eq!(estimator.measure(sample(0, 20_000), 10, 512), 750);
        assert_eq!(estimator.measure(sample(0, 20_000), 10, 512), 1_125);
        assert_eq!(estimator.raw_rpm(), 1_500);
    }
}
