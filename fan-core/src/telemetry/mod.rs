//! Control-loop event log shared by firmware and host targets.
//!
//! The state machine records notable transitions into a fixed-capacity ring so
//! the firmware can mirror them to defmt and the emulator can print them,
//! without the core crate depending on either logging backend.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::channel::FanId;
use crate::config::{ConfigError, LoadReport, VarId};
use crate::machine::ControlMode;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Number of records retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Events emitted by the control state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Bring-up finished loading the persisted configuration.
    Initialized(LoadReport),
    /// A mode began executing after a transition.
    ModeEntered(ControlMode),
    /// A debug frame changed a persisted variable.
    ParameterWritten { var: VarId, value: i64, clamped: bool },
    /// An invalid temperature source selector was restored to its default.
    SelectorHealed(FanId),
    /// A debug mode received no frame for too long and fell back to normal.
    DebugTimeout(ControlMode),
    /// A layout error forced the controller back through initialization.
    FatalReset(ConfigError),
}

impl ControlEvent {
    /// Returns `true` for events that deserve warning-level logging.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        match self {
            ControlEvent::Initialized(report) => !report.is_clean() || report.reset_to_defaults,
            ControlEvent::ParameterWritten { clamped, .. } => *clamped,
            ControlEvent::SelectorHealed(_)
            | ControlEvent::DebugTimeout(_)
            | ControlEvent::FatalReset(_) => true,
            ControlEvent::ModeEntered(_) => false,
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::Initialized(report) => {
                write!(
                    f,
                    "initialized clamped={} failed={}",
                    report.clamped, report.failed
                )?;
                if report.reset_to_defaults {
                    f.write_str(" (defaults restored)")?;
                }
                Ok(())
            }
            ControlEvent::ModeEntered(mode) => write!(f, "mode {}", mode.label()),
            ControlEvent::ParameterWritten {
                var,
                value,
                clamped,
            } => {
                write!(f, "set {}={value}", var.name())?;
                if *clamped {
                    f.write_str(" (clamped)")?;
                }
                Ok(())
            }
            ControlEvent::SelectorHealed(fan) => {
                write!(f, "{} temperature source reset to default", fan.label())
            }
            ControlEvent::DebugTimeout(mode) => {
                write!(f, "{} timed out, returning to normal", mode.label())
            }
            ControlEvent::FatalReset(error) => write!(f, "reset: {error}"),
        }
    }
}

/// One entry of the event ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Tick timestamp (µs, wrapping).
    pub timestamp_us: u32,
    pub event: ControlEvent,
}

/// Fixed-capacity ring of control events.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates an empty recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event, overwriting the oldest record when full.
    pub fn record(&mut self, event: ControlEvent, timestamp_us: u32) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp_us,
            event,
        });
        id
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    ///
    /// Consumers keep [`next_event_id`](Self::next_event_id) as their cursor
    /// to drain only new events.
    pub fn records_since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        let pending = self.next_event_id.wrapping_sub(cursor);
        self.oldest_first()
            .filter(move |record| record.id.wrapping_sub(cursor) < pending)
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Most recent record.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_ring_overwrites() {
        let mut recorder = TelemetryRecorder::<4>::new();
        for tick in 0..6 {
            recorder.record(ControlEvent::ModeEntered(ControlMode::Normal), tick * 10);
        }

        assert_eq!(recorder.len(), 4);
        let ids: std::vec::Vec<_> = recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids, [2, 3, 4, 5]);
        assert_eq!(recorder.latest().map(|record| record.timestamp_us), Some(50));
    }

    #[test]
    fn records_since_skips_drained_events() {
        let mut recorder = TelemetryRecorder::<8>::new();
        recorder.record(ControlEvent::SelectorHealed(FanId::Fan1), 0);
        let cursor = recorder.next_event_id();
        recorder.record(ControlEvent::DebugTimeout(ControlMode::DebugPi1), 5);

        let fresh: std::vec::Vec<_> = recorder.records_since(cursor).collect();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].event, ControlEvent::DebugTimeout(ControlMode::DebugPi1));
        assert_eq!(recorder.records_since(recorder.next_event_id()).count(), 0);
    }

    #[test]
    fn display_is_human_readable() {
        let event = ControlEvent::ParameterWritten {
            var: VarId::Pi1Kp,
            value: 512,
            clamped: false,
        };
        assert_eq!(event.to_string(), "set pi1Kp=512");
        assert!(!event.is_warning());
        assert!(ControlEvent::FatalReset(ConfigError::UnknownVariable(VarId::Pi1Kp)).is_warning());
    }
}
