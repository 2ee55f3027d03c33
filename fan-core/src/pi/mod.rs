//! Fixed-point PI controller with clamped integrator.
//!
//! Units follow the duty scale: the proportional and integral terms are kept
//! in quarter duty counts and the output is a PWM duty in `1..=255`. The
//! integrator accumulates tenths of an RPM-second.

/// Right shift applied to `error * kp`.
pub const PROPORTIONAL_SHIFT: u32 = 11;
/// Right shift applied to `integrator * ki`.
pub const INTEGRAL_SHIFT: u32 = 15;
/// Right shift converting quarter counts into duty.
pub const OUTPUT_SHIFT: u32 = 2;
/// Lower bound of either term.
pub const TERM_MIN: i32 = -16_384;
/// Upper bound of either term.
pub const TERM_MAX: i32 = 16_383;
/// Smallest duty the controller emits.
pub const MIN_OUTPUT: u8 = 1;
/// Largest duty the controller emits.
pub const MAX_OUTPUT: u8 = 255;
/// Divisor turning `error * sample_time_us` into integrator units.
pub const INTEGRATOR_NORMALIZER: i64 = 100_000;

/// Tunable parameters of a [`PiController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PiGains {
    /// Control period in microseconds.
    pub sample_time_us: u32,
    /// Proportional gain (2^-13 duty counts per RPM).
    pub kp: i16,
    /// Integral gain (2^-17 duty counts per integrator unit).
    pub ki: i16,
    /// Upper integrator bound.
    pub integrator_max: i16,
    /// Lower integrator bound.
    pub integrator_min: i16,
}

/// Discrete PI controller.
#[derive(Clone, Debug)]
pub struct PiController {
    gains: PiGains,
    integrator: i16,
    proportional_term: i32,
    integral_term: i32,
}

impl PiController {
    /// Creates a controller with an empty integrator.
    #[must_use]
    pub const fn new(gains: PiGains) -> Self {
        Self {
            gains,
            integrator: 0,
            proportional_term: 0,
            integral_term: 0,
        }
    }

    /// Gains currently in effect.
    #[must_use]
    pub const fn gains(&self) -> PiGains {
        self.gains
    }

    /// Replaces the gains without touching the integrator.
    pub fn set_gains(&mut self, gains: PiGains) {
        self.gains = gains;
    }

    /// Advances the integrator by `error` and returns the new duty.
    pub fn control(&mut self, error: i32) -> u8 {
        let step = i64::from(error) * i64::from(self.gains.sample_time_us) / INTEGRATOR_NORMALIZER;
        let integrated = constrain(
            i64::from(self.integrator) + step,
            i64::from(self.gains.integrator_min),
            i64::from(self.gains.integrator_max),
        );
        self.integrator = narrow_i16(integrated);
        self.output(error)
    }

    /// Computes a duty for `error` from the current integrator without advancing it.
    pub fn control_without_integration(&mut self, error: i32) -> u8 {
        self.output(error)
    }

    /// Sets the integrator to `value`.
    pub fn reset_integrator(&mut self, value: i16) {
        self.integrator = value;
    }

    /// Proportional term from the last step, in quarter duty counts.
    #[must_use]
    pub const fn proportional_term(&self) -> i32 {
        self.proportional_term
    }

    /// Integral term from the last step, in quarter duty counts.
    #[must_use]
    pub const fn integral_term(&self) -> i32 {
        self.integral_term
    }

    /// Raw integrator state.
    #[must_use]
    pub const fn integrator(&self) -> i16 {
        self.integrator
    }

    fn output(&mut self, error: i32) -> u8 {
        self.proportional_term = term(
            (i64::from(error) * i64::from(self.gains.kp)) >> PROPORTIONAL_SHIFT,
        );
        self.integral_term = term(
            (i64::from(self.integrator) * i64::from(self.gains.ki)) >> INTEGRAL_SHIFT,
        );

        let duty = constrain(
            i64::from(self.proportional_term + self.integral_term) >> OUTPUT_SHIFT,
            i64::from(MIN_OUTPUT),
            i64::from(MAX_OUTPUT),
        );
        u8::try_from(duty).unwrap_or(MAX_OUTPUT)
    }
}

/// Bounds `value` to `[low, high]`, testing the lower bound first.
///
/// Unlike [`Ord::clamp`] this never panics when the bounds are inverted by a
/// bad configuration; `low` wins for values below it and `high` otherwise.
const fn constrain(value: i64, low: i64, high: i64) -> i64 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn term(value: i64) -> i32 {
    constrain(value, TERM_MIN as i64, TERM_MAX as i64) as i32
}

fn narrow_i16(value: i64) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}
