#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Mirrors the control loop's event ring to defmt (target) or stdout (host).
//!
//! The state machine never logs directly. After each tick the control task
//! calls [`drain`] with the cursor it kept from the previous call, so every
//! record is logged exactly once even though the ring is shared.

use fan_core::machine::StatusSnapshot;
use fan_core::telemetry::{ControlEvent, EventId, TelemetryRecord, TelemetryRecorder};

/// Ticks between status snapshots (one second at the default period).
pub const STATUS_INTERVAL_TICKS: u32 = 20;

/// Severity a record is logged at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub const fn of(event: &ControlEvent) -> Self {
        match event {
            ControlEvent::FatalReset(_) => Level::Error,
            other if other.is_warning() => Level::Warn,
            _ => Level::Info,
        }
    }
}

/// Logs every record newer than `cursor` and returns the next cursor.
pub fn drain<const CAPACITY: usize>(
    recorder: &TelemetryRecorder<CAPACITY>,
    cursor: EventId,
) -> EventId {
    for record in recorder.records_since(cursor) {
        emit_record(record);
    }
    recorder.next_event_id()
}

/// Logs the periodic status view.
pub fn log_status(snapshot: &StatusSnapshot) {
    emit_status(snapshot);
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord) {
    let event = defmt::Display2Format(&record.event);
    match Level::of(&record.event) {
        Level::Info => defmt::info!(
            "telemetry:{=u32} t={=u32}us {}",
            record.id,
            record.timestamp_us,
            event
        ),
        Level::Warn => defmt::warn!(
            "telemetry:{=u32} t={=u32}us {}",
            record.id,
            record.timestamp_us,
            event
        ),
        Level::Error => defmt::error!(
            "telemetry:{=u32} t={=u32}us {}",
            record.id,
            record.timestamp_us,
            event
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord) {
    let level = match Level::of(&record.event) {
        Level::Info => "INFO",
        Level::Warn => "WARN",
        Level::Error => "ERROR",
    };
    println!(
        "{level} telemetry:{} t={}us {}",
        record.id, record.timestamp_us, record.event
    );
}

#[cfg(target_os = "none")]
fn emit_status(snapshot: &StatusSnapshot) {
    defmt::info!("status: {}", defmt::Display2Format(snapshot));
}

#[cfg(not(target_os = "none"))]
fn emit_status(snapshot: &StatusSnapshot) {
    println!("status: {snapshot}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use fan_core::channel::FanId;
    use fan_core::config::{ConfigError, VarId};
    use fan_core::machine::ControlMode;

    #[test]
    fn drain_advances_past_logged_records() {
        let mut recorder = TelemetryRecorder::<8>::new();
        recorder.record(ControlEvent::ModeEntered(ControlMode::Normal), 0);
        recorder.record(ControlEvent::SelectorHealed(FanId::Fan2), 50_000);

        let cursor = drain(&recorder, 0);
        assert_eq!(cursor, 2);
        assert_eq!(drain(&recorder, cursor), cursor);

        recorder.record(ControlEvent::DebugTimeout(ControlMode::DebugTemp), 100_000);
        assert_eq!(drain(&recorder, cursor), 3);
    }

    #[test]
    fn levels_follow_event_severity() {
        assert_eq!(
            Level::of(&ControlEvent::ModeEntered(ControlMode::DebugPi2)),
            Level::Info
        );
        assert_eq!(
            Level::of(&ControlEvent::ParameterWritten {
                var: VarId::MaxRpm2,
                value: 9_999,
                clamped: true,
            }),
            Level::Warn
        );
        assert_eq!(
            Level::of(&ControlEvent::FatalReset(ConfigError::UnknownVariable(
                VarId::Pi1Kp
            ))),
            Level::Error
        );
    }
}
