use fan_core::channel::FanId;
use fan_core::config::{ConfigError, ConfigStore, MemoryStorage, VARIABLES, VarId, VarSpec};
use fan_core::edge::EdgeSample;
use fan_core::machine::{
    Banner, ControlMode, ControlStateMachine, FanDriver, MachineConfig, TickInputs, TickReport,
};
use fan_core::protocol::{DebugFrame, DebugHeader, Payload};
use fan_core::telemetry::ControlEvent;
use fan_core::temperature::TemperatureUnit;

const PERIOD_US: u32 = 50_000;
const COLD: [u16; 2] = [100, 100];
const HOT: [u16; 2] = [250, 250];

#[derive(Default)]
struct RecordingDriver {
    applied: Vec<(FanId, u8)>,
    releases: usize,
}

impl RecordingDriver {
    fn last_duty(&self, fan: FanId) -> Option<u8> {
        self.applied
            .iter()
            .rev()
            .find(|(applied, _)| *applied == fan)
            .map(|(_, duty)| *duty)
    }
}

impl FanDriver for RecordingDriver {
    fn apply(&mut self, fan: FanId, duty: u8) {
        self.applied.push((fan, duty));
    }

    fn release_all(&mut self) {
        self.releases += 1;
    }
}

struct Harness {
    machine: ControlStateMachine<MemoryStorage>,
    driver: RecordingDriver,
    now_us: u32,
}

impl Harness {
    fn new() -> Self {
        Self::with_table(&VARIABLES)
    }

    fn with_table(table: &'static [VarSpec]) -> Self {
        let store = ConfigStore::with_layout(MemoryStorage::new(), table, 1024);
        Self {
            machine: ControlStateMachine::new(store, MachineConfig::default()),
            driver: RecordingDriver::default(),
            now_us: 0,
        }
    }

    fn tick(&mut self, temperatures: [u16; 2], edges: [EdgeSample; 2], rx: &[u8]) -> TickReport {
        let inputs = TickInputs {
            temperatures,
            edges,
            serial_rx: rx,
            ..TickInputs::idle(self.now_us)
        };
        let report = self.machine.tick(&inputs, &mut self.driver);
        self.now_us = self.now_us.wrapping_add(PERIOD_US);
        report
    }

    fn spinning(&self, interval_us: u32) -> [EdgeSample; 2] {
        let edge = EdgeSample {
            last_edge_us: self.now_us.wrapping_sub(1_000),
            interval_us,
        };
        [edge; 2]
    }

    fn send(&mut self, header: DebugHeader, payload: Payload, temperatures: [u16; 2]) {
        let bytes = DebugFrame::new(header, payload).encode();
        let edges = self.spinning(60_000);
        let report = self.tick(temperatures, edges, &bytes);
        assert_eq!(report.frame, Some(header));
    }
}

#[test]
fn stalled_fans_stay_off_when_cold() {
    let mut harness = Harness::new();
    let report = harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    assert_eq!(report.executed, ControlMode::Init);
    assert_eq!(harness.driver.releases, 1);

    for _ in 0..5 {
        let report = harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
        assert_eq!(report.executed, ControlMode::Normal);
        assert_eq!(report.duties, [0, 0]);
    }

    for fan in FanId::ALL {
        assert_eq!(harness.machine.channel(fan).rpm(), 0);
        assert_eq!(harness.machine.channel(fan).duty(), 0);
        assert_eq!(harness.driver.last_duty(fan), Some(0));
    }
}

#[test]
fn hot_sensors_drive_both_fans() {
    let mut harness = Harness::new();
    harness.tick(HOT, [EdgeSample::STALLED; 2], &[]);

    for _ in 0..10 {
        let edges = harness.spinning(60_000);
        harness.tick(HOT, edges, &[]);
    }

    for fan in FanId::ALL {
        let channel = harness.machine.channel(fan);
        assert_eq!(channel.reference_rpm(), 1_100, "S4 applies above T4");
        assert!(channel.rpm() > 0 && channel.rpm() <= 500);
        assert!(channel.pi().integrator() > 0, "positive error must accumulate");
        assert!(harness.driver.last_duty(fan).is_some_and(|duty| duty > 0));
    }
}

#[test]
fn pi_debug_overrides_one_channel_and_idles_the_other() {
    let mut harness = Harness::new();
    harness.tick(HOT, [EdgeSample::STALLED; 2], &[]);
    for _ in 0..5 {
        let edges = harness.spinning(60_000);
        harness.tick(HOT, edges, &[]);
    }
    assert!(harness.machine.channel(FanId::Fan1).pi().integrator() > 0);

    let defaults = [900, 400, 1_000, 30_000, 0, 768, 650, 2_500];
    harness.send(DebugHeader::Pi1, defaults, HOT);
    let writes = harness.machine.store().storage().write_count();

    let edges = harness.spinning(60_000);
    let report = harness.tick(HOT, edges, &[]);
    assert_eq!(report.executed, ControlMode::DebugPi1);
    assert_eq!(report.banner, Some(Banner::Entering(ControlMode::DebugPi1)));

    let fan1 = harness.machine.channel(FanId::Fan1);
    assert_eq!(fan1.reference_rpm(), 900);
    let expected = ((900 - i32::from(fan1.rpm())) * 50_000 / 100_000).clamp(0, 30_000);
    assert_eq!(
        i32::from(fan1.pi().integrator()),
        expected,
        "entry resets the integrator before the first step"
    );

    let fan2 = harness.machine.channel(FanId::Fan2);
    assert_eq!(fan2.duty(), 0);
    assert_eq!(fan2.reference_rpm(), 1_100);
    assert_eq!(report.duties[1], 0);
    assert_eq!(
        harness.machine.store().storage().write_count(),
        writes,
        "payload equal to the stored values must not be rewritten"
    );
}

#[test]
fn normal_frame_returns_from_debug_mode() {
    let mut harness = Harness::new();
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    harness.send(DebugHeader::Table1, [155, 189, 223, 246, 660, 750, 1_100, 1_100], COLD);
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    assert_eq!(harness.machine.mode(), ControlMode::DebugTable1);

    let report = harness.tick(COLD, [EdgeSample::STALLED; 2], b"DNRM");
    assert_eq!(report.next, ControlMode::Normal);
    let report = harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    assert_eq!(report.banner, Some(Banner::Entering(ControlMode::Normal)));
}

#[test]
fn button_mode_counts_presses() {
    let mut harness = Harness::new();
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    harness.send(DebugHeader::Buttons, [0; 8], COLD);

    for pressed in [true, true, false, true] {
        let inputs = TickInputs {
            buttons: [pressed, false, false],
            ..TickInputs::idle(harness.now_us)
        };
        harness.machine.tick(&inputs, &mut harness.driver);
        harness.now_us += PERIOD_US;
    }

    let counts = harness.machine.buttons().counts();
    assert_eq!(counts[0].presses, 2);
    assert_eq!(counts[0].held_ticks, 1);
    assert_eq!(counts[1].presses, 0);

    let snapshot = harness.machine.snapshot().expect("snapshot");
    assert_eq!(snapshot.mode, ControlMode::DebugButtons);
    assert!(snapshot.to_string().ends_with("B1 2/1 B2 0/0 B3 0/0"));
}

#[test]
fn temp_mode_switches_display_unit() {
    let mut harness = Harness::new();
    harness.tick([512, 512], [EdgeSample::STALLED; 2], &[]);
    harness.send(DebugHeader::Temp, [1, 0, 0, 250, 250, 0, 0, 0], [512, 512]);
    harness.tick([512, 512], [EdgeSample::STALLED; 2], &[]);

    assert_eq!(harness.machine.store().value(VarId::UseFahrenheit), Ok(1));
    let snapshot = harness.machine.snapshot().expect("snapshot");
    assert_eq!(snapshot.unit, TemperatureUnit::Fahrenheit);
    assert!(
        snapshot.to_string().starts_with("DEBUG TEMP T1 257.0F T2 257.0F"),
        "unexpected snapshot: {snapshot}"
    );
}

#[test]
fn invalid_selector_is_healed_and_persisted() {
    let mut table = VARIABLES.to_vec();
    table[VarId::TempSource1.as_index()].max = 255;
    let mut harness = Harness::with_table(Box::leak(table.into_boxed_slice()));
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);

    harness
        .machine
        .store_mut()
        .write(VarId::TempSource1, 9)
        .expect("write selector");
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);

    assert_eq!(harness.machine.store().value(VarId::TempSource1), Ok(2));
    assert_eq!(
        harness.machine.store().storage().slot(VarId::TempSource1.as_index())[0],
        2
    );
    assert!(
        harness
            .machine
            .telemetry()
            .oldest_first()
            .any(|record| record.event == ControlEvent::SelectorHealed(FanId::Fan1))
    );
}

#[test]
fn layout_error_reinitializes_in_the_same_tick() {
    let mut harness = Harness::with_table(&VARIABLES[..20]);
    harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    let releases = harness.driver.releases;

    let report = harness.tick(COLD, [EdgeSample::STALLED; 2], &[]);
    assert_eq!(report.executed, ControlMode::Init);
    assert_eq!(report.banner, Some(Banner::Initializing));
    assert_eq!(harness.driver.releases, releases + 1);
    assert_eq!(harness.machine.mode(), ControlMode::Normal);

    let fatal = harness
        .machine
        .telemetry()
        .oldest_first()
        .find_map(|record| match record.event {
            ControlEvent::FatalReset(error) => Some(error),
            _ => None,
        });
    assert_eq!(
        fatal,
        Some(ConfigError::UnknownVariable(VarId::Fan1TableTemp1))
    );
}
