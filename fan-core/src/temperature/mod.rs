//! Fixed-point conversion between raw sensor counts and tenths of a degree.
//!
//! Each sensor is described by an offset in millivolts at 0 °C and a slope in
//! °C per 5 V of input. Counts are 10-bit ADC readings referenced to 5 V. All
//! arithmetic is integer with truncating division and arithmetic shifts, so the
//! same inputs always produce the same outputs.

use core::fmt;

/// Highest raw ADC count.
pub const ADC_MAX: u16 = 1_023;

/// Temperature unit used for display and debug output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Decodes the persisted unit flag.
    #[must_use]
    pub const fn from_flag(use_fahrenheit: bool) -> Self {
        if use_fahrenheit {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }
}

/// Calibration of one analog sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorCalibration {
    /// Sensor output at 0 °C, in millivolts.
    pub offset_mv: i16,
    /// Degrees Celsius per 5 V of sensor output.
    pub scale_c_per_5v: i16,
}

impl SensorCalibration {
    /// Offset expressed in tenths of a count (`offset * 1024 / 500`).
    #[allow(clippy::cast_lossless)]
    const fn offset_counts10(self) -> i32 {
        ((self.offset_mv as i32) << 10) / 500
    }
}

/// Tenths of a degree Celsius for a raw reading.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn counts_to_c10(counts: u16, calibration: SensorCalibration) -> i32 {
    ((counts as i32 * 10 - calibration.offset_counts10()) * calibration.scale_c_per_5v as i32) >> 10
}

/// Tenths of a degree Fahrenheit for a raw reading.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn counts_to_f10(counts: u16, calibration: SensorCalibration) -> i32 {
    let offset = ((calibration.offset_mv as i32 * 9) << 10) / 500;
    (((counts as i32 * 90 - offset) * calibration.scale_c_per_5v as i32 / 5) >> 10) + 320
}

/// Raw reading for a temperature in tenths of a degree Celsius.
///
/// Returns `None` when the calibration slope is zero. Results are limited to
/// the ADC range.
#[must_use]
pub fn c10_to_counts(c10: i32, calibration: SensorCalibration) -> Option<u16> {
    let scale = i32::from(calibration.scale_c_per_5v);
    let scaled = (c10 << 10).checked_div(scale)?;
    Some(into_adc_range(
        (scaled + calibration.offset_counts10()) / 10,
    ))
}

/// Raw reading for a temperature in tenths of a degree Fahrenheit.
///
/// Returns `None` when the calibration slope is zero. Results are limited to
/// the ADC range.
#[must_use]
pub fn f10_to_counts(f10: i32, calibration: SensorCalibration) -> Option<u16> {
    let scale = i32::from(calibration.scale_c_per_5v);
    let scaled = (((f10 - 320) * 5 / 9) << 10).checked_div(scale)?;
    Some(into_adc_range(
        (scaled + calibration.offset_counts10()) / 10,
    ))
}

/// Whole degrees Celsius from tenths of a degree Celsius.
#[must_use]
pub const fn c10_to_c(c10: i32) -> i32 {
    c10 / 10
}

/// Whole degrees Celsius from tenths of a degree Fahrenheit.
#[must_use]
pub const fn f10_to_c(f10: i32) -> i32 {
    (f10 - 320) * 5 / 90
}

/// Converts a raw reading into tenths of `unit`.
#[must_use]
pub const fn counts_to_tenths(
    counts: u16,
    calibration: SensorCalibration,
    unit: TemperatureUnit,
) -> Tenths {
    match unit {
        TemperatureUnit::Celsius => Tenths(counts_to_c10(counts, calibration)),
        TemperatureUnit::Fahrenheit => Tenths(counts_to_f10(counts, calibration)),
    }
}

/// Fixed-point value in tenths, displayed with one decimal place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tenths(pub i32);

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{}", magnitude / 10, magnitude % 10)
    }
}

fn into_adc_range(value: i32) -> u16 {
    u16::try_from(value.clamp(0, i32::from(ADC_MAX))).unwrap_or(ADC_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: SensorCalibration = SensorCalibration {
        offset_mv: 0,
        scale_c_per_5v: 250,
    };

    const OFFSET: SensorCalibration = SensorCalibration {
        offset_mv: 500,
        scale_c_per_5v: 250,
    };

    #[test]
    fn default_calibration_scales_linearly() {
        assert_eq!(counts_to_c10(512, DEFAULT), 1_250);
        assert_eq!(counts_to_f10(512, DEFAULT), 2_570);
        assert_eq!(c10_to_counts(1_250, DEFAULT), Some(512));
        assert_eq!(f10_to_counts(2_570, DEFAULT), Some(512));
    }

    #[test]
    fn offset_shifts_zero_point() {
        assert_eq!(counts_to_c10(512, OFFSET), 1_000);
        assert_eq!(counts_to_f10(512, OFFSET), 2_120);
        assert_eq!(c10_to_counts(1_000, OFFSET), Some(512));
        assert_eq!(counts_to_c10(0, OFFSET), -250);
    }

    #[test]
    fn whole_degree_helpers() {
        assert_eq!(c10_to_c(1_257), 125);
        assert_eq!(f10_to_c(2_120), 100);
    }

    #[test]
    fn zero_slope_has_no_inverse() {
        let flat = SensorCalibration {
            offset_mv: 0,
            scale_c_per_5v: 0,
        };
        assert_eq!(c10_to_counts(100, flat), None);
        assert_eq!(f10_to_counts(100, flat), None);
    }

    #[test]
    fn tenths_display_keeps_sign() {
        assert_eq!(Tenths(1_250).to_string(), "125.0");
        assert_eq!(Tenths(-5).to_string(), "-0.5");
        assert_eq!(Tenths(-250).to_string(), "-25.0");
    }
}
