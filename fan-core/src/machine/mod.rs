//! Tick-driven control state machine.
//!
//! [`ControlStateMachine::tick`] runs once per control period. Each tick
//! measures both fans, runs the body of the active [`ControlMode`], drives the
//! outputs, and then consults the debug protocol to pick the mode for the next
//! tick. Entry actions (banner, integrator reset, button counter reset) run at
//! the start of the first tick in a new mode.
//!
//! A [`ConfigError`] inside a mode body is a broken variable layout. It is
//! recorded and the machine re-runs bring-up in the same tick instead of
//! halting.

use heapless::Vec;

use crate::channel::{FanChannel, FanId};
use crate::config::{ConfigError, ConfigStore, Storage};
use crate::edge::EdgeSample;
use crate::pi::PiGains;
use crate::protocol::{DebugHeader, FrameScanner, PAYLOAD_WORDS, Payload, SCAN_WINDOW};
use crate::reference::TempSource;
use crate::speed::SpeedConfig;
use crate::telemetry::{ControlEvent, TelemetryRecorder};
use crate::temperature::counts_to_tenths;

mod buttons;
mod mode;
mod params;
mod snapshot;

pub use buttons::{BUTTON_COUNT, ButtonCounts, ButtonMonitor};
pub use mode::{Banner, ControlMode, PayloadTargets};
pub use params::{ChannelParams, FanVars, SensorParams};
pub use snapshot::{FanStatus, StatusSnapshot};

/// Build-time tuning of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Control period, also the PI sample time.
    pub tick_period_us: u32,
    /// Ticks a debug mode may run without a frame before returning to normal.
    pub debug_timeout_ticks: u32,
    /// Echo bytes the frame scanner skips back to the sender.
    pub echo_unrecognized: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tick_period_us: 50_000,
            // Two minutes at the default period.
            debug_timeout_ticks: 2_400,
            echo_unrecognized: true,
        }
    }
}

/// Output stage driving the fans.
pub trait FanDriver {
    /// Applies a PWM duty (0 = off, 255 = full speed).
    fn apply(&mut self, fan: FanId, duty: u8);

    /// Switches every fan off.
    fn release_all(&mut self);
}

/// Fan driver that performs no hardware interaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopFanDriver;

impl FanDriver for NoopFanDriver {
    fn apply(&mut self, _fan: FanId, _duty: u8) {}

    fn release_all(&mut self) {}
}

/// Everything sampled for one tick.
#[derive(Clone, Copy, Debug)]
pub struct TickInputs<'a> {
    /// Tick timestamp on the same clock as the edge samples (µs, wrapping).
    pub now_us: u32,
    pub edges: [EdgeSample; 2],
    /// Raw ADC counts of both sensors.
    pub temperatures: [u16; 2],
    /// Button levels, `true` when pressed.
    pub buttons: [bool; BUTTON_COUNT],
    /// Serial bytes received since the previous tick.
    pub serial_rx: &'a [u8],
}

impl TickInputs<'_> {
    /// Inputs with stalled fans, zero temperatures, no buttons, and no serial data.
    #[must_use]
    pub const fn idle(now_us: u32) -> Self {
        Self {
            now_us,
            edges: [EdgeSample::STALLED; 2],
            temperatures: [0; 2],
            buttons: [false; BUTTON_COUNT],
            serial_rx: &[],
        }
    }
}

/// What one tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Mode whose body ran.
    pub executed: ControlMode,
    /// Mode selected for the next tick.
    pub next: ControlMode,
    pub duties: [u8; 2],
    /// Line to write to the serial port.
    pub banner: Option<Banner>,
    /// Unrecognized serial bytes to echo back.
    pub echo: Vec<u8, SCAN_WINDOW>,
    /// Header of the frame accepted this tick.
    pub frame: Option<DebugHeader>,
}

impl TickReport {
    fn new(mode: ControlMode) -> Self {
        Self {
            executed: mode,
            next: mode,
            duties: [0; 2],
            banner: None,
            echo: Vec::new(),
            frame: None,
        }
    }
}

// Replaced from the store before the controller first runs.
const UNSET_GAINS: PiGains = PiGains {
    sample_time_us: 0,
    kp: 0,
    ki: 0,
    integrator_max: 0,
    integrator_min: 0,
};

/// Owns both fan channels, the configuration store, and the operating mode.
pub struct ControlStateMachine<S> {
    config: MachineConfig,
    mode: ControlMode,
    state_changed: bool,
    store: ConfigStore<S>,
    channels: [FanChannel; 2],
    scanner: FrameScanner,
    payload: Payload,
    ticks_since_frame: u32,
    buttons: ButtonMonitor,
    temperatures: [u16; 2],
    telemetry: TelemetryRecorder,
}

impl<S: Storage> ControlStateMachine<S> {
    /// Creates a machine in [`ControlMode::Init`] with default tachometers.
    pub fn new(store: ConfigStore<S>, config: MachineConfig) -> Self {
        Self::with_speed_config(store, config, [SpeedConfig::default(); 2])
    }

    /// Creates a machine with explicit tachometer characteristics per fan.
    pub fn with_speed_config(
        store: ConfigStore<S>,
        config: MachineConfig,
        speed: [SpeedConfig; 2],
    ) -> Self {
        let [speed1, speed2] = speed;
        Self {
            config,
            mode: ControlMode::Init,
            state_changed: true,
            store,
            channels: [
                FanChannel::new(FanId::Fan1, speed1, UNSET_GAINS),
                FanChannel::new(FanId::Fan2, speed2, UNSET_GAINS),
            ],
            scanner: FrameScanner::new(),
            payload: [0; PAYLOAD_WORDS],
            ticks_since_frame: 0,
            buttons: ButtonMonitor::new(),
            temperatures: [0; 2],
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Runs one control period.
    pub fn tick(&mut self, inputs: &TickInputs<'_>, driver: &mut impl FanDriver) -> TickReport {
        let now_us = inputs.now_us;
        let mut report = TickReport::new(self.mode);
        self.temperatures = inputs.temperatures;
        self.scanner.feed(inputs.serial_rx);

        if self.mode == ControlMode::Init {
            self.initialize(now_us, driver, &mut report);
            return report;
        }

        if let Err(error) = self.run_body(inputs, &mut report) {
            self.telemetry
                .record(ControlEvent::FatalReset(error), now_us);
            self.reset();
            let mut report = TickReport::new(ControlMode::Init);
            self.initialize(now_us, driver, &mut report);
            return report;
        }

        for channel in &self.channels {
            driver.apply(channel.id(), channel.duty());
        }
        report.duties = self.duties();

        let next = self.dispatch(now_us, &mut report);
        self.state_changed = next != report.executed;
        self.mode = next;
        report.next = next;
        report
    }

    /// Forces the next tick through bring-up.
    pub fn reset(&mut self) {
        self.mode = ControlMode::Init;
        self.state_changed = true;
        for channel in &mut self.channels {
            channel.reset();
        }
        self.scanner.clear();
        self.payload = [0; PAYLOAD_WORDS];
        self.ticks_since_frame = 0;
        self.buttons.reset();
    }

    /// Builds the status view for the display.
    pub fn snapshot(&self) -> Result<StatusSnapshot, ConfigError> {
        let sensors = SensorParams::load(&self.store)?;
        let [first, second] = self.temperatures;
        let [cal1, cal2] = sensors.calibration;
        Ok(StatusSnapshot {
            mode: self.mode,
            fans: [
                FanStatus::from(&self.channels[0]),
                FanStatus::from(&self.channels[1]),
            ],
            temperatures: [
                counts_to_tenths(first, cal1, sensors.unit),
                counts_to_tenths(second, cal2, sensors.unit),
            ],
            unit: sensors.unit,
            buttons: self.buttons.counts(),
        })
    }

    #[must_use]
    pub const fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Set when the next tick runs entry actions.
    #[must_use]
    pub const fn state_changed(&self) -> bool {
        self.state_changed
    }

    #[must_use]
    pub const fn config(&self) -> MachineConfig {
        self.config
    }

    #[must_use]
    pub const fn channel(&self, fan: FanId) -> &FanChannel {
        &self.channels[fan.as_index()]
    }

    #[must_use]
    pub const fn duties(&self) -> [u8; 2] {
        [self.channels[0].duty(), self.channels[1].duty()]
    }

    /// Payload of the most recent frame.
    #[must_use]
    pub const fn payload(&self) -> Payload {
        self.payload
    }

    /// Ticks the active debug mode has run without a frame.
    #[must_use]
    pub const fn ticks_since_frame(&self) -> u32 {
        self.ticks_since_frame
    }

    #[must_use]
    pub const fn buttons(&self) -> &ButtonMonitor {
        &self.buttons
    }

    #[must_use]
    pub fn pending_rx(&self) -> &[u8] {
        self.scanner.pending()
    }

    pub const fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    fn initialize(&mut self, now_us: u32, driver: &mut impl FanDriver, report: &mut TickReport) {
        driver.release_all();
        for channel in &mut self.channels {
            channel.force_off();
        }

        let loaded = self.store.load_all();
        self.telemetry
            .record(ControlEvent::Initialized(loaded), now_us);

        self.mode = ControlMode::Normal;
        self.state_changed = true;
        self.ticks_since_frame = 0;

        report.banner = Some(Banner::Initializing);
        report.duties = [0; 2];
        report.next = ControlMode::Normal;
    }

    fn run_body(
        &mut self,
        inputs: &TickInputs<'_>,
        report: &mut TickReport,
    ) -> Result<(), ConfigError> {
        let now_us = inputs.now_us;
        let mode = self.mode;
        if self.state_changed {
            self.enter(mode, now_us, report);
        }

        self.apply_payload(mode, now_us)?;

        let sample_time_us = self.config.tick_period_us;
        let params = [
            ChannelParams::load(&self.store, FanId::Fan1, sample_time_us)?,
            ChannelParams::load(&self.store, FanId::Fan2, sample_time_us)?,
        ];
        for ((channel, params), sample) in self.channels.iter_mut().zip(&params).zip(inputs.edges) {
            channel.pi_mut().set_gains(params.gains);
            channel.measure(sample, now_us, params.filter_gain);
        }

        match mode {
            ControlMode::Init | ControlMode::Normal => {
                for fan in FanId::ALL {
                    let params = &params[fan.as_index()];
                    let reference = self.policy_reference(fan, params, now_us)?;
                    self.channels[fan.as_index()].regulate(reference, params.limits);
                }
            }
            ControlMode::DebugPi1 | ControlMode::DebugPi2 => {
                let target = mode.pi_target().unwrap_or(FanId::Fan1);
                for fan in FanId::ALL {
                    let params = &params[fan.as_index()];
                    let reference = self.policy_reference(fan, params, now_us)?;
                    let channel = &mut self.channels[fan.as_index()];
                    if fan == target {
                        channel.regulate(self.payload[0], params.limits);
                    } else {
                        channel.observe(reference);
                    }
                }
            }
            ControlMode::DebugButtons => {
                self.force_off();
                self.buttons.sample(inputs.buttons);
            }
            ControlMode::DebugTemp
            | ControlMode::DebugFanOnOff
            | ControlMode::DebugTable1
            | ControlMode::DebugTable2 => self.force_off(),
        }
        Ok(())
    }

    fn enter(&mut self, mode: ControlMode, now_us: u32, report: &mut TickReport) {
        report.banner = Some(Banner::Entering(mode));
        self.telemetry
            .record(ControlEvent::ModeEntered(mode), now_us);
        for channel in &mut self.channels {
            channel.pi_mut().reset_integrator(0);
        }
        if mode == ControlMode::DebugButtons {
            self.buttons.reset();
        }
        self.state_changed = false;
    }

    /// Writes every payload word the mode maps to a variable, skipping
    /// values that already match the store.
    fn apply_payload(&mut self, mode: ControlMode, now_us: u32) -> Result<(), ConfigError> {
        for (word, target) in self.payload.into_iter().zip(mode.payload_targets()) {
            let Some(var) = target else {
                continue;
            };
            let value = self.store.spec(var)?.kind.from_word(word);
            if let Some(checked) = self.store.update(var, value)? {
                self.telemetry.record(
                    ControlEvent::ParameterWritten {
                        var,
                        value: checked.value,
                        clamped: checked.clamped,
                    },
                    now_us,
                );
            }
        }
        Ok(())
    }

    /// Evaluates the reference policy, persisting the default selector when
    /// the stored one is invalid.
    fn policy_reference(
        &mut self,
        fan: FanId,
        params: &ChannelParams,
        now_us: u32,
    ) -> Result<u16, ConfigError> {
        let previous = self.channels[fan.as_index()].reference_rpm();
        let output = params.policy.evaluate(self.temperatures, previous);
        if output.healed {
            self.store.write(
                FanVars::of(fan).source,
                i64::from(TempSource::DEFAULT.as_raw()),
            )?;
            self.telemetry
                .record(ControlEvent::SelectorHealed(fan), now_us);
        }
        Ok(output.reference)
    }

    fn force_off(&mut self) {
        for channel in &mut self.channels {
            channel.force_off();
        }
    }

    /// Scans for a frame and decides the next mode.
    fn dispatch(&mut self, now_us: u32, report: &mut TickReport) -> ControlMode {
        let executed = report.executed;
        let echo_enabled = self.config.echo_unrecognized;
        let echo = &mut report.echo;
        let frame = self.scanner.scan(|byte| {
            if echo_enabled {
                let _ = echo.push(byte);
            }
        });

        if let Some(frame) = frame {
            self.payload = frame.payload;
            self.ticks_since_frame = 0;
            report.frame = Some(frame.header);
            return frame.header.mode();
        }

        if !executed.is_debug() {
            self.ticks_since_frame = 0;
            return executed;
        }

        self.ticks_since_frame = self.ticks_since_frame.saturating_add(1);
        if self.ticks_since_frame >= self.config.debug_timeout_ticks {
            self.ticks_since_frame = 0;
            self.telemetry
                .record(ControlEvent::DebugTimeout(executed), now_us);
            return ControlMode::Normal;
        }
        executed
    }
}
