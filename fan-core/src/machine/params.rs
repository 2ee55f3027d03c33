//! Per-tick view of the persisted parameters each channel runs with.

use crate::channel::{FanId, RpmLimits};
use crate::config::{ConfigError, ConfigStore, Storage, VarId};
use crate::pi::PiGains;
use crate::reference::{FanCurve, ReferencePolicy};
use crate::temperature::{SensorCalibration, TemperatureUnit};

/// Variable identities owned by one fan channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanVars {
    pub kp: VarId,
    pub ki: VarId,
    pub integrator_max: VarId,
    pub integrator_min: VarId,
    pub filter: VarId,
    pub min_rpm: VarId,
    pub max_rpm: VarId,
    pub source: VarId,
    pub turn_off: VarId,
    pub turn_on: VarId,
    pub table_temperatures: [VarId; 4],
    pub table_speeds: [VarId; 4],
}

const FAN1_VARS: FanVars = FanVars {
    kp: VarId::Pi1Kp,
    ki: VarId::Pi1Ki,
    integrator_max: VarId::Pi1IntMax,
    integrator_min: VarId::Pi1IntMin,
    filter: VarId::Fan1Filter,
    min_rpm: VarId::MinRpm1,
    max_rpm: VarId::MaxRpm1,
    source: VarId::TempSource1,
    turn_off: VarId::Fan1TurnOff,
    turn_on: VarId::Fan1TurnOn,
    table_temperatures: [
        VarId::Fan1TableTemp1,
        VarId::Fan1TableTemp2,
        VarId::Fan1TableTemp3,
        VarId::Fan1TableTemp4,
    ],
    table_speeds: [
        VarId::Fan1TableSpeed1,
        VarId::Fan1TableSpeed2,
        VarId::Fan1TableSpeed3,
        VarId::Fan1TableSpeed4,
    ],
};

const FAN2_VARS: FanVars = FanVars {
    kp: VarId::Pi2Kp,
    ki: VarId::Pi2Ki,
    integrator_max: VarId::Pi2IntMax,
    integrator_min: VarId::Pi2IntMin,
    filter: VarId::Fan2Filter,
    min_rpm: VarId::MinRpm2,
    max_rpm: VarId::MaxRpm2,
    source: VarId::TempSource2,
    turn_off: VarId::Fan2TurnOff,
    turn_on: VarId::Fan2TurnOn,
    table_temperatures: [
        VarId::Fan2TableTemp1,
        VarId::Fan2TableTemp2,
        VarId::Fan2TableTemp3,
        VarId::Fan2TableTemp4,
    ],
    table_speeds: [
        VarId::Fan2TableSpeed1,
        VarId::Fan2TableSpeed2,
        VarId::Fan2TableSpeed3,
        VarId::Fan2TableSpeed4,
    ],
};

impl FanVars {
    #[must_use]
    pub const fn of(fan: FanId) -> &'static FanVars {
        match fan {
            FanId::Fan1 => &FAN1_VARS,
            FanId::Fan2 => &FAN2_VARS,
        }
    }
}

/// Parameters of one channel, read from the store at the start of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelParams {
    pub gains: PiGains,
    pub limits: RpmLimits,
    pub filter_gain: u16,
    pub policy: ReferencePolicy,
}

impl ChannelParams {
    pub fn load<S: Storage>(
        store: &ConfigStore<S>,
        fan: FanId,
        sample_time_us: u32,
    ) -> Result<Self, ConfigError> {
        let vars = FanVars::of(fan);
        let min_rpm = store.u16_value(vars.min_rpm)?;

        let mut temperatures = [0; 4];
        let mut speeds = [0; 4];
        for (slot, id) in temperatures.iter_mut().zip(vars.table_temperatures) {
            *slot = store.u16_value(id)?;
        }
        for (slot, id) in speeds.iter_mut().zip(vars.table_speeds) {
            *slot = store.u16_value(id)?;
        }

        Ok(Self {
            gains: PiGains {
                sample_time_us,
                kp: store.i16_value(vars.kp)?,
                ki: store.i16_value(vars.ki)?,
                integrator_max: store.i16_value(vars.integrator_max)?,
                integrator_min: store.i16_value(vars.integrator_min)?,
            },
            limits: RpmLimits {
                min_rpm,
                max_rpm: store.u16_value(vars.max_rpm)?,
            },
            filter_gain: store.u16_value(vars.filter)?,
            policy: ReferencePolicy {
                source: store.u8_value(vars.source)?,
                curve: FanCurve {
                    turn_off: store.u16_value(vars.turn_off)?,
                    turn_on: store.u16_value(vars.turn_on)?,
                    min_rpm,
                    temperatures,
                    speeds,
                },
            },
        })
    }
}

/// Calibration of both sensors plus the display unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorParams {
    pub unit: TemperatureUnit,
    pub calibration: [SensorCalibration; 2],
}

impl SensorParams {
    pub fn load<S: Storage>(store: &ConfigStore<S>) -> Result<Self, ConfigError> {
        Ok(Self {
            unit: TemperatureUnit::from_flag(store.u8_value(VarId::UseFahrenheit)? != 0),
            calibration: [
                SensorCalibration {
                    offset_mv: store.i16_value(VarId::Temp1Offset)?,
                    scale_c_per_5v: store.i16_value(VarId::Temp1Scale)?,
                },
                SensorCalibration {
                    offset_mv: store.i16_value(VarId::Temp2Offset)?,
                    scale_c_per_5v: store.i16_value(VarId::Temp2Scale)?,
                },
            ],
        })
    }
}
