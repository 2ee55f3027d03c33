//! Operating modes and the payload layout each debug mode accepts.

use core::fmt;

use crate::channel::FanId;
use crate::config::VarId;
use crate::protocol::PAYLOAD_WORDS;

use super::params::FanVars;

/// Persisted variable written by each payload word, if any.
pub type PayloadTargets = [Option<VarId>; PAYLOAD_WORDS];

const NO_TARGETS: PayloadTargets = [None; PAYLOAD_WORDS];

/// Operating mode of the controller. Exactly one is active per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlMode {
    Init,
    Normal,
    DebugPi1,
    DebugPi2,
    DebugButtons,
    DebugTemp,
    DebugFanOnOff,
    DebugTable1,
    DebugTable2,
}

impl ControlMode {
    /// Returns `true` for modes entered through a debug frame.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        !matches!(self, ControlMode::Init | ControlMode::Normal)
    }

    /// Upper-case name used in serial banners.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ControlMode::Init => "INIT",
            ControlMode::Normal => "NORMAL",
            ControlMode::DebugPi1 => "DEBUG PI1",
            ControlMode::DebugPi2 => "DEBUG PI2",
            ControlMode::DebugButtons => "DEBUG BUTTONS",
            ControlMode::DebugTemp => "DEBUG TEMP",
            ControlMode::DebugFanOnOff => "DEBUG FAN ON/OFF",
            ControlMode::DebugTable1 => "DEBUG TABLE1",
            ControlMode::DebugTable2 => "DEBUG TABLE2",
        }
    }

    /// Channel whose reference is overridden by `WORD0`.
    #[must_use]
    pub const fn pi_target(self) -> Option<FanId> {
        match self {
            ControlMode::DebugPi1 => Some(FanId::Fan1),
            ControlMode::DebugPi2 => Some(FanId::Fan2),
            _ => None,
        }
    }

    /// Variables written from the payload while this mode runs.
    #[must_use]
    pub const fn payload_targets(self) -> PayloadTargets {
        match self {
            ControlMode::DebugPi1 => pi_targets(FanVars::of(FanId::Fan1)),
            ControlMode::DebugPi2 => pi_targets(FanVars::of(FanId::Fan2)),
            ControlMode::DebugTemp => [
                Some(VarId::UseFahrenheit),
                Some(VarId::Temp1Offset),
                Some(VarId::Temp2Offset),
                Some(VarId::Temp1Scale),
                Some(VarId::Temp2Scale),
                None,
                None,
                None,
            ],
            ControlMode::DebugFanOnOff => {
                let fan1 = FanVars::of(FanId::Fan1);
                let fan2 = FanVars::of(FanId::Fan2);
                [
                    Some(fan1.turn_off),
                    Some(fan1.turn_on),
                    Some(fan1.min_rpm),
                    Some(fan1.source),
                    Some(fan2.turn_off),
                    Some(fan2.turn_on),
                    Some(fan2.min_rpm),
                    Some(fan2.source),
                ]
            }
            ControlMode::DebugTable1 => table_targets(FanVars::of(FanId::Fan1)),
            ControlMode::DebugTable2 => table_targets(FanVars::of(FanId::Fan2)),
            ControlMode::Init | ControlMode::Normal | ControlMode::DebugButtons => NO_TARGETS,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// WORD0 carries the reference override rather than a persisted value.
const fn pi_targets(vars: &FanVars) -> PayloadTargets {
    [
        None,
        Some(vars.kp),
        Some(vars.ki),
        Some(vars.integrator_max),
        Some(vars.integrator_min),
        Some(vars.filter),
        Some(vars.min_rpm),
        Some(vars.max_rpm),
    ]
}

const fn table_targets(vars: &FanVars) -> PayloadTargets {
    let [t1, t2, t3, t4] = vars.table_temperatures;
    let [s1, s2, s3, s4] = vars.table_speeds;
    [
        Some(t1),
        Some(t2),
        Some(t3),
        Some(t4),
        Some(s1),
        Some(s2),
        Some(s3),
        Some(s4),
    ]
}

/// Line written to the serial port on bring-up and on every mode entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Banner {
    Initializing,
    Entering(ControlMode),
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Initializing => f.write_str("INITIALIZING..."),
            Banner::Entering(mode) => write!(f, "ENTERING {} STATE", mode.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_framed_modes_are_debug() {
        assert!(!ControlMode::Init.is_debug());
        assert!(!ControlMode::Normal.is_debug());
        assert!(ControlMode::DebugTable2.is_debug());
    }

    #[test]
    fn pi_payload_skips_reference_word() {
        let targets = ControlMode::DebugPi2.payload_targets();
        assert_eq!(targets[0], None);
        assert_eq!(targets[1], Some(VarId::Pi2Kp));
        assert_eq!(targets[5], Some(VarId::Fan2Filter));
        assert_eq!(targets[7], Some(VarId::MaxRpm2));
    }

    #[test]
    fn table_payload_is_temperatures_then_speeds() {
        let targets = ControlMode::DebugTable1.payload_targets();
        assert_eq!(targets[0], Some(VarId::Fan1TableTemp1));
        assert_eq!(targets[4], Some(VarId::Fan1TableSpeed1));
        assert_eq!(targets[7], Some(VarId::Fan1TableSpeed4));
    }

    #[test]
    fn buttons_write_nothing() {
        assert!(ControlMode::DebugButtons.payload_targets().iter().all(Option::is_none));
    }

    #[test]
    fn banners() {
        assert_eq!(Banner::Initializing.to_string(), "INITIALIZING...");
        assert_eq!(
            Banner::Entering(ControlMode::DebugPi1).to_string(),
            "ENTERING DEBUG PI1 STATE"
        );
    }
}
