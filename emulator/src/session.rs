use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use fan_core::channel::FanId;
use fan_core::config::{ConfigStore, MemoryStorage};
use fan_core::edge::EdgeSample;
use fan_core::machine::{
    BUTTON_COUNT, ControlStateMachine, FanDriver, MachineConfig, SensorParams, TickInputs,
};
use fan_core::protocol::{DebugFrame, DebugHeader, PAYLOAD_WORDS, Payload, SCAN_WINDOW};
use fan_core::telemetry::EventId;
use fan_core::temperature::{
    SensorCalibration, TemperatureUnit, c10_to_c, c10_to_counts, counts_to_c10, counts_to_f10,
    f10_to_c, f10_to_counts,
};

/// Longest `tick` run accepted from one command (five minutes of control time).
const MAX_TICKS_PER_COMMAND: u32 = 6_000;

/// Steady-state speed of a simulated fan at full duty.
const PLANT_MAX_RPM: i32 = 3_000;
/// Below this speed a simulated fan produces no tach edges.
const PLANT_MIN_SPIN_RPM: i32 = 200;
const PLANT_TIME_CONSTANT_US: i32 = 500_000;
const PLANT_PULSES_PER_REV: i32 = 2;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "temp",
        "temp <t1> <t2>                - set both sensors, whole degrees of the display unit",
    ),
    (
        "adc",
        "adc <c1> <c2>                 - set both sensors as raw ADC counts",
    ),
    (
        "buttons",
        "buttons <xxx>                 - hold buttons, one digit per button (1 = pressed)",
    ),
    (
        "tick",
        "tick [n]                      - run n control periods (default 1)",
    ),
    (
        "send",
        "send <text>                   - queue raw text on the serial link",
    ),
    (
        "frame",
        "frame <HDR> [w0..w7]          - queue a debug frame (DPI1 DPI2 DBTN DTMP DFON DTB1 DTB2 DNRM)",
    ),
    (
        "status",
        "status                        - show the two-line status display",
    ),
    (
        "config",
        "config [name]                 - list persisted variables",
    ),
    (
        "help",
        "help [topic]                  - show help for a command",
    ),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Warmup,
    DebugPi,
    Tables,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Warmup => "transcripts/emulator-warmup.log",
            TranscriptProfile::DebugPi => "transcripts/emulator-debug-pi.log",
            TranscriptProfile::Tables => "transcripts/emulator-tables.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Warmup => "Fan Controller Emulator warm-up transcript",
            TranscriptProfile::DebugPi => "Fan Controller Emulator PI tuning transcript",
            TranscriptProfile::Tables => "Fan Controller Emulator fan table transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("warmup") {
            Ok(Self::Warmup)
        } else if tag.eq_ignore_ascii_case("debug-pi") {
            Ok(Self::DebugPi)
        } else if tag.eq_ignore_ascii_case("tables") {
            Ok(Self::Tables)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// One simulated fan: speed follows the commanded duty with a first-order lag.
#[derive(Clone, Copy, Debug)]
struct SimulatedFan {
    duty: u8,
    rpm: i32,
    edge: EdgeSample,
}

impl SimulatedFan {
    const fn new() -> Self {
        Self {
            duty: 0,
            rpm: 0,
            edge: EdgeSample::STALLED,
        }
    }

    fn advance(&mut self, now_us: u32, elapsed_us: u32) -> EdgeSample {
        let target = i32::from(self.duty) * PLANT_MAX_RPM / i32::from(u8::MAX);
        let elapsed = i32::try_from(elapsed_us).unwrap_or(i32::MAX);
        let step = i64::from(target - self.rpm) * i64::from(elapsed)
            / i64::from(PLANT_TIME_CONSTANT_US);
        let step = i32::try_from(step).unwrap_or(0);
        self.rpm = if step == 0 { target } else { self.rpm + step };

        // A stopped rotor leaves the last edge in place so it ages into a stall.
        if self.rpm >= PLANT_MIN_SPIN_RPM {
            let interval = 60_000_000 / (self.rpm * PLANT_PULSES_PER_REV);
            self.edge = EdgeSample {
                last_edge_us: now_us,
                interval_us: u32::try_from(interval).unwrap_or(u32::MAX),
            };
        }
        self.edge
    }
}

/// Both simulated fans, driven through the same trait as the PWM outputs.
#[derive(Debug)]
struct Plant {
    fans: [SimulatedFan; 2],
}

impl Plant {
    const fn new() -> Self {
        Self {
            fans: [SimulatedFan::new(); 2],
        }
    }

    fn advance(&mut self, now_us: u32, elapsed_us: u32) -> [EdgeSample; 2] {
        let [first, second] = &mut self.fans;
        [
            first.advance(now_us, elapsed_us),
            second.advance(now_us, elapsed_us),
        ]
    }

    fn rpm(&self, fan: FanId) -> i32 {
        self.fans[fan.as_index()].rpm
    }
}

impl FanDriver for Plant {
    fn apply(&mut self, fan: FanId, duty: u8) {
        self.fans[fan.as_index()].duty = duty;
    }

    fn release_all(&mut self) {
        for fan in &mut self.fans {
            fan.duty = 0;
        }
    }
}

pub struct Session {
    machine: ControlStateMachine<MemoryStorage>,
    plant: Plant,
    temperatures: [u16; 2],
    buttons: [bool; BUTTON_COUNT],
    serial_rx: Vec<u8>,
    now_us: u32,
    cursor: EventId,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
}

impl Session {
    /// Session printing to the caller only.
    pub fn new() -> Self {
        Self {
            machine: ControlStateMachine::new(
                ConfigStore::new(MemoryStorage::new()),
                MachineConfig::default(),
            ),
            plant: Plant::new(),
            temperatures: [0; 2],
            buttons: [false; BUTTON_COUNT],
            serial_rx: Vec::new(),
            now_us: 0,
            cursor: 0,
            transcript: None,
            started_at: HostInstant::now(),
        }
    }

    /// Session that also appends every exchange to the profile's transcript.
    pub fn recording(profile: TranscriptProfile) -> io::Result<Self> {
        let mut session = Self::new();
        session.transcript = Some(TranscriptLogger::new(profile)?);
        Ok(session)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.log(elapsed, TranscriptRole::Host, &[trimmed.to_string()])?;

        let (command, rest) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(command, rest)| (command, rest.trim()));
        let lines = match command.to_ascii_lowercase().as_str() {
            "help" => help_lines((!rest.is_empty()).then_some(rest)),
            "temp" => self.handle_temp(rest),
            "adc" => self.handle_adc(rest),
            "buttons" => self.handle_buttons(rest),
            "tick" => self.handle_tick(rest),
            "send" => self.handle_send(rest),
            "frame" => self.handle_frame(rest),
            "status" => self.status_lines(),
            "config" => self.handle_config(rest),
            other => vec![format!("ERR unknown command `{other}` (try `help`)")],
        };

        self.log(elapsed, TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn handle_temp(&mut self, args: &str) -> Vec<String> {
        let Some([t1, t2]) = parse_pair::<i32>(args) else {
            return vec!["ERR usage: temp <t1> <t2>".to_string()];
        };
        let sensors = match SensorParams::load(self.machine.store()) {
            Ok(sensors) => sensors,
            Err(error) => return vec![format!("ERR {error}")],
        };

        let mut counts = [0; 2];
        for ((slot, degrees), calibration) in counts.iter_mut().zip([t1, t2]).zip(sensors.calibration)
        {
            let converted = match sensors.unit {
                TemperatureUnit::Celsius => c10_to_counts(degrees.saturating_mul(10), calibration),
                TemperatureUnit::Fahrenheit => {
                    f10_to_counts(degrees.saturating_mul(10), calibration)
                }
            };
            let Some(converted) = converted else {
                return vec!["ERR sensor scale is zero".to_string()];
            };
            *slot = converted;
        }
        self.temperatures = counts;
        vec![self.sensor_readback()]
    }

    fn handle_adc(&mut self, args: &str) -> Vec<String> {
        match parse_pair::<u16>(args) {
            Some(counts) => {
                self.temperatures = counts;
                vec![self.sensor_readback()]
            }
            None => vec!["ERR usage: adc <c1> <c2>".to_string()],
        }
    }

    /// Raw counts plus the whole degrees Celsius the controller reads back.
    fn sensor_readback(&self) -> String {
        let counts = self.temperatures;
        match SensorParams::load(self.machine.store()) {
            Ok(sensors) => {
                let [c1, c2] = counts;
                let [cal1, cal2] = sensors.calibration;
                format!(
                    "OK adc={counts:?} reads {}C {}C",
                    whole_celsius(c1, cal1, sensors.unit),
                    whole_celsius(c2, cal2, sensors.unit)
                )
            }
            Err(error) => format!("OK adc={counts:?} ({error})"),
        }
    }

    fn handle_buttons(&mut self, args: &str) -> Vec<String> {
        let digits = args.as_bytes();
        if digits.len() != BUTTON_COUNT || !digits.iter().all(|d| matches!(d, b'0' | b'1')) {
            return vec![format!(
                "ERR usage: buttons <{}>",
                "0".repeat(BUTTON_COUNT)
            )];
        }
        for (level, digit) in self.buttons.iter_mut().zip(digits) {
            *level = *digit == b'1';
        }
        vec![format!("OK buttons={args}")]
    }

    fn handle_tick(&mut self, args: &str) -> Vec<String> {
        let count = if args.is_empty() {
            Ok(1)
        } else {
            args.parse::<u32>()
        };
        let count = match count {
            Ok(count) if (1..=MAX_TICKS_PER_COMMAND).contains(&count) => count,
            _ => return vec![format!("ERR usage: tick [1-{MAX_TICKS_PER_COMMAND}]")],
        };

        let mut lines = Vec::new();
        for _ in 0..count {
            self.step(&mut lines);
        }
        lines.push(format!(
            "t={}ms mode={} duty={:?} rpm={}/{} plant={}/{}",
            self.now_us / 1_000,
            self.machine.mode(),
            self.machine.duties(),
            self.machine.channel(FanId::Fan1).rpm(),
            self.machine.channel(FanId::Fan2).rpm(),
            self.plant.rpm(FanId::Fan1),
            self.plant.rpm(FanId::Fan2),
        ));
        lines
    }

    fn handle_send(&mut self, text: &str) -> Vec<String> {
        self.serial_rx.extend_from_slice(text.as_bytes());
        vec![format!("OK queued {} bytes", text.len())]
    }

    fn handle_frame(&mut self, args: &str) -> Vec<String> {
        let mut fields = args.split_whitespace();
        let Some(header) = fields.next().and_then(DebugHeader::from_tag) else {
            return vec!["ERR usage: frame <HDR> [w0..w7]".to_string()];
        };

        let mut payload: Payload = [0; PAYLOAD_WORDS];
        for (index, field) in fields.enumerate() {
            if index >= PAYLOAD_WORDS {
                return vec![format!("ERR at most {PAYLOAD_WORDS} payload words")];
            }
            match field.parse::<u16>() {
                Ok(word) => payload[index] = word,
                Err(_) => return vec![format!("ERR invalid payload word `{field}`")],
            }
        }

        let bytes = DebugFrame::new(header, payload).encode();
        self.serial_rx.extend_from_slice(&bytes);
        vec![format!("OK queued {header:?} frame ({} bytes)", bytes.len())]
    }

    fn handle_config(&self, filter: &str) -> Vec<String> {
        let store = self.machine.store();
        let lines: Vec<String> = store
            .table()
            .iter()
            .filter(|spec| filter.is_empty() || spec.id.name().eq_ignore_ascii_case(filter))
            .map(|spec| match store.value(spec.id) {
                Ok(value) => format!(
                    "{:<14} = {value} [{}..={}]",
                    spec.id.name(),
                    spec.min,
                    spec.max
                ),
                Err(error) => format!("{:<14} ! {error}", spec.id.name()),
            })
            .collect();
        if lines.is_empty() {
            vec![format!("ERR unknown variable `{filter}`")]
        } else {
            lines
        }
    }

    fn status_lines(&self) -> Vec<String> {
        match self.machine.snapshot() {
            Ok(snapshot) => snapshot.to_string().lines().map(str::to_string).collect(),
            Err(error) => vec![format!("ERR {error}")],
        }
    }

    /// Runs one control period against the plant.
    fn step(&mut self, lines: &mut Vec<String>) {
        let period_us = self.machine.config().tick_period_us;
        let edges = self.plant.advance(self.now_us, period_us);

        let take = self.serial_rx.len().min(SCAN_WINDOW);
        let received: Vec<u8> = self.serial_rx.drain(..take).collect();
        let inputs = TickInputs {
            now_us: self.now_us,
            edges,
            temperatures: self.temperatures,
            buttons: self.buttons,
            serial_rx: &received,
        };
        let report = self.machine.tick(&inputs, &mut self.plant);

        if let Some(banner) = report.banner {
            lines.push(format!("SERIAL> {banner}"));
        }
        if !report.echo.is_empty() {
            lines.push(format!("ECHO> {}", report.echo.escape_ascii()));
        }
        for record in self.machine.telemetry().records_since(self.cursor) {
            lines.push(format!(
                "EVENT #{} t={}ms {}",
                record.id,
                record.timestamp_us / 1_000,
                record.event
            ));
        }
        self.cursor = self.machine.telemetry().next_event_id();
        self.now_us = self.now_us.wrapping_add(period_us);
    }

    fn log(&mut self, elapsed: Duration, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are host milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => {
            let mut lines = vec!["Commands:".to_string()];
            lines.extend(HELP_TOPICS.iter().map(|(_, usage)| format!("  {usage}")));
            lines.push("  exit | quit                   - leave the emulator".to_string());
            lines
        }
        Some(topic) => match HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        {
            Some((_, usage)) => vec![(*usage).to_string()],
            None => vec![format!("ERR no help for `{topic}`")],
        },
    }
}

fn whole_celsius(counts: u16, calibration: SensorCalibration, unit: TemperatureUnit) -> i32 {
    match unit {
        TemperatureUnit::Celsius => c10_to_c(counts_to_c10(counts, calibration)),
        TemperatureUnit::Fahrenheit => f10_to_c(counts_to_f10(counts, calibration)),
    }
}

fn parse_pair<T: std::str::FromStr>(args: &str) -> Option<[T; 2]> {
    let mut fields = args.split_whitespace();
    let first = fields.next()?.parse().ok()?;
    let second = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some([first, second])
}
