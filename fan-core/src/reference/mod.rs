//! Temperature-to-speed reference policy.
//!
//! Temperatures are raw ADC counts. A channel stays off at or below its
//! turn-off point, holds its minimum speed in the band up to the turn-on point
//! once running, and follows a four-point piecewise-linear table above that.

/// Which sensor reading drives a fan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempSource {
    Sensor1,
    Sensor2,
    Max,
    Mean,
}

impl TempSource {
    /// Selector restored when a persisted value is invalid.
    pub const DEFAULT: Self = TempSource::Max;

    /// Decodes a persisted selector.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TempSource::Sensor1),
            1 => Some(TempSource::Sensor2),
            2 => Some(TempSource::Max),
            3 => Some(TempSource::Mean),
            _ => None,
        }
    }

    /// Persisted encoding of the selector.
    #[must_use]
    pub const fn as_raw(self) -> u8 {
        match self {
            TempSource::Sensor1 => 0,
            TempSource::Sensor2 => 1,
            TempSource::Max => 2,
            TempSource::Mean => 3,
        }
    }

    /// Picks the feedback temperature from both sensors.
    #[must_use]
    pub fn select(self, temperatures: [u16; 2]) -> u16 {
        let [first, second] = temperatures;
        match self {
            TempSource::Sensor1 => first,
            TempSource::Sensor2 => second,
            TempSource::Max => first.max(second),
            TempSource::Mean => {
                let sum = u32::from(first) + u32::from(second);
                u16::try_from(sum >> 1).unwrap_or(u16::MAX)
            }
        }
    }
}

/// Feedback temperature chosen for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub temperature: u16,
    /// Set when the persisted selector was invalid and must be restored.
    pub healed: bool,
}

/// Resolves a raw selector, falling back to the hotter sensor when it is invalid.
#[must_use]
pub fn select_feedback(raw_selector: u8, temperatures: [u16; 2]) -> Feedback {
    match TempSource::from_raw(raw_selector) {
        Some(source) => Feedback {
            temperature: source.select(temperatures),
            healed: false,
        },
        None => Feedback {
            temperature: TempSource::Max.select(temperatures),
            healed: true,
        },
    }
}

/// Hysteresis thresholds and lookup table of one fan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanCurve {
    pub turn_off: u16,
    pub turn_on: u16,
    pub min_rpm: u16,
    pub temperatures: [u16; 4],
    pub speeds: [u16; 4],
}

impl FanCurve {
    /// Target speed for `feedback` given the reference applied last tick.
    #[must_use]
    pub fn reference(&self, feedback: u16, previous: u16) -> u16 {
        let [t1, t2, t3, t4] = self.temperatures;
        let [s1, s2, s3, s4] = self.speeds;

        if feedback <= self.turn_off {
            return 0;
        }
        if feedback <= self.turn_on {
            // Inside the band a running fan holds its minimum and a stopped fan stays off.
            return if previous > 0 { self.min_rpm } else { 0 };
        }
        if feedback >= t4 {
            return s4;
        }

        let ((x0, y0), (x2, y2)) = if feedback < t1 {
            ((self.turn_on, self.min_rpm), (t1, s1))
        } else if feedback < t2 {
            ((t1, s1), (t2, s2))
        } else if feedback < t3 {
            ((t2, s2), (t3, s3))
        } else {
            ((t3, s3), (t4, s4))
        };
        interpolate(feedback, (x0, y0), (x2, y2))
    }
}

/// Integer linear interpolation `y0 + (y2 - y0) * (x - x0) / (x2 - x0)`.
///
/// Callers guarantee `x0 <= x < x2`; a degenerate span yields `y0`.
#[must_use]
pub fn interpolate(x: u16, (x0, y0): (u16, u16), (x2, y2): (u16, u16)) -> u16 {
    let span = i32::from(x2) - i32::from(x0);
    if span == 0 {
        return y0;
    }
    let value = (i32::from(y2) - i32::from(y0)) * (i32::from(x) - i32::from(x0)) / span
        + i32::from(y0);
    u16::try_from(value.max(0)).unwrap_or(u16::MAX)
}

/// Result of evaluating a [`ReferencePolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyOutput {
    pub reference: u16,
    /// The selector was invalid; the caller persists [`TempSource::DEFAULT`].
    pub healed: bool,
}

/// Source selector plus curve for one fan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferencePolicy {
    pub source: u8,
    pub curve: FanCurve,
}

impl ReferencePolicy {
    /// Computes this tick's reference from both sensor readings.
    #[must_use]
    pub fn evaluate(&self, temperatures: [u16; 2], previous: u16) -> PolicyOutput {
        let feedback = select_feedback(self.source, temperatures);
        PolicyOutput {
            reference: self.curve.reference(feedback.temperature, previous),
            healed: feedback.healed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> FanCurve {
        FanCurve {
            turn_off: 120,
            turn_on: 132,
            min_rpm: 650,
            temperatures: [155, 189, 223, 246],
            speeds: [660, 750, 1_100, 1_100],
        }
    }

    #[test]
    fn selector_variants() {
        let temps = [300, 101];
        assert_eq!(TempSource::Sensor1.select(temps), 300);
        assert_eq!(TempSource::Sensor2.select(temps), 101);
        assert_eq!(TempSource::Max.select(temps), 300);
        assert_eq!(TempSource::Mean.select(temps), 200);
    }

    #[test]
    fn invalid_selector_falls_back_to_max() {
        assert_eq!(
            select_feedback(9, [10, 20]),
            Feedback {
                temperature: 20,
                healed: true
            }
        );
        assert!(!select_feedback(0, [10, 20]).healed);
    }

    #[test]
    fn raw_round_trip() {
        for raw in 0..4 {
            let source = TempSource::from_raw(raw).expect("valid selector");
            assert_eq!(source.as_raw(), raw);
        }
        assert_eq!(TempSource::from_raw(4), None);
    }

    #[test]
    fn below_turn_on_segment_starts_at_minimum() {
        // 650 + (660 - 650) * (140 - 132) / (155 - 132) = 653
        assert_eq!(curve().reference(140, 0), 653);
    }

    #[test]
    fn table_segments() {
        let curve = curve();
        assert_eq!(curve.reference(170, 0), 699);
        assert_eq!(curve.reference(189, 0), 750);
        assert_eq!(curve.reference(200, 0), 863);
        assert_eq!(curve.reference(246, 0), 1_100);
        assert_eq!(curve.reference(1_000, 0), 1_100);
    }

    #[test]
    fn falling_speeds_interpolate_downward() {
        assert_eq!(interpolate(15, (10, 1_000), (20, 500)), 750);
    }

    #[test]
    fn degenerate_span_returns_start() {
        assert_eq!(interpolate(10, (10, 400), (10, 900)), 400);
    }
}
