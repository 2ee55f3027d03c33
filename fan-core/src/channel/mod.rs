//! Per-fan control state and the regulation step.

use crate::edge::EdgeSample;
use crate::pi::{PiController, PiGains};
use crate::speed::{SpeedConfig, SpeedEstimator};

/// Identifies one of the two fan channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FanId {
    Fan1,
    Fan2,
}

impl FanId {
    /// Both channels in index order.
    pub const ALL: [FanId; 2] = [FanId::Fan1, FanId::Fan2];

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            FanId::Fan1 => 0,
            FanId::Fan2 => 1,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(FanId::Fan1),
            1 => Some(FanId::Fan2),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FanId::Fan1 => "fan1",
            FanId::Fan2 => "fan2",
        }
    }
}

/// Configured speed window of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpmLimits {
    pub min_rpm: u16,
    pub max_rpm: u16,
}

/// Measured speed, reference, controller, and output of one fan.
#[derive(Clone, Debug)]
pub struct FanChannel {
    id: FanId,
    speed: SpeedEstimator,
    pi: PiController,
    reference_rpm: u16,
    duty: u8,
}

impl FanChannel {
    /// Creates an idle channel.
    #[must_use]
    pub const fn new(id: FanId, speed: SpeedConfig, gains: PiGains) -> Self {
        Self {
            id,
            speed: SpeedEstimator::new(speed),
            pi: PiController::new(gains),
            reference_rpm: 0,
            duty: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> FanId {
        self.id
    }

    /// Updates the filtered speed from an edge sample.
    pub fn measure(&mut self, sample: EdgeSample, now_us: u32, filter_gain: u16) -> u16 {
        self.speed.measure(sample, now_us, filter_gain)
    }

    /// Drives the fan toward `reference`.
    ///
    /// References below the minimum switch the fan off without running the
    /// controller, so the integrator does not creep while stopped. References
    /// above the maximum are clamped and still regulated.
    pub fn regulate(&mut self, reference: u16, limits: RpmLimits) -> u8 {
        if reference < limits.min_rpm {
            self.reference_rpm = 0;
            self.duty = 0;
            return 0;
        }

        self.reference_rpm = reference.min(limits.max_rpm);
        self.duty = self.pi.control(self.error());
        self.duty
    }

    /// Stores `reference` and computes diagnostic terms without driving the fan.
    pub fn observe(&mut self, reference: u16) {
        self.reference_rpm = reference;
        self.pi.control_without_integration(self.error());
        self.duty = 0;
    }

    /// Forces reference and duty to zero.
    pub fn force_off(&mut self) {
        self.reference_rpm = 0;
        self.duty = 0;
    }

    /// Returns the channel to its power-on state, dropping filter history.
    pub fn reset(&mut self) {
        self.speed.reset();
        self.pi.reset_integrator(0);
        self.force_off();
    }

    #[must_use]
    pub const fn rpm(&self) -> u16 {
        self.speed.rpm()
    }

    #[must_use]
    pub const fn reference_rpm(&self) -> u16 {
        self.reference_rpm
    }

    #[must_use]
    pub const fn duty(&self) -> u8 {
        self.duty
    }

    #[must_use]
    pub const fn pi(&self) -> &PiController {
        &self.pi
    }

    pub fn pi_mut(&mut self) -> &mut PiController {
        &mut self.pi
    }

    fn error(&self) -> i32 {
        i32::from(self.reference_rpm) - i32::from(self.speed.rpm())
    }
}
