//! Point-in-time status view rendered on the display and in logs.

use core::fmt;

use crate::channel::FanChannel;
use crate::temperature::{Tenths, TemperatureUnit};

use super::ControlMode;
use super::buttons::{BUTTON_COUNT, ButtonCounts};

/// Status of one fan channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanStatus {
    pub rpm: u16,
    pub reference_rpm: u16,
    pub duty: u8,
    pub proportional_term: i32,
    pub integral_term: i32,
    pub integrator: i16,
}

impl From<&FanChannel> for FanStatus {
    fn from(channel: &FanChannel) -> Self {
        Self {
            rpm: channel.rpm(),
            reference_rpm: channel.reference_rpm(),
            duty: channel.duty(),
            proportional_term: channel.pi().proportional_term(),
            integral_term: channel.pi().integral_term(),
            integrator: channel.pi().integrator(),
        }
    }
}

/// Everything the status display shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode: ControlMode,
    pub fans: [FanStatus; 2],
    /// Sensor readings in tenths of `unit`.
    pub temperatures: [Tenths; 2],
    pub unit: TemperatureUnit,
    pub buttons: [ButtonCounts; BUTTON_COUNT],
}

impl fmt::Display for StatusSnapshot {
    /// Two lines: mode and temperatures, then a mode-specific detail line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit.symbol();
        let [t1, t2] = self.temperatures;
        writeln!(f, "{} T1 {t1}{unit} T2 {t2}{unit}", self.mode)?;

        match self.mode.pi_target() {
            Some(fan) => {
                let status = &self.fans[fan.as_index()];
                write!(
                    f,
                    "F{} {}/{} d{} P{} I{} INT{}",
                    fan.as_index() + 1,
                    status.rpm,
                    status.reference_rpm,
                    status.duty,
                    status.proportional_term,
                    status.integral_term,
                    status.integrator
                )
            }
            None if self.mode == ControlMode::DebugButtons => {
                for (index, counts) in self.buttons.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "B{} {}/{}", index + 1, counts.presses, counts.held_ticks)?;
                }
                Ok(())
            }
            None => {
                let [fan1, fan2] = &self.fans;
                write!(
                    f,
                    "F1 {}/{} d{} F2 {}/{} d{}",
                    fan1.rpm,
                    fan1.reference_rpm,
                    fan1.duty,
                    fan2.rpm,
                    fan2.reference_rpm,
                    fan2.duty
                )
            }
        }
    }
}
