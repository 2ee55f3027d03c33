use embassy_time::{Duration, Ticker};
use fan_core::machine::{ControlStateMachine, TickInputs};
use fan_core::protocol::SCAN_WINDOW;
use fan_core::tick::TickGate;

use super::{EDGE_TIMERS, SERIAL, now_us};
use crate::hw::{AdcSensors, I2cEeprom, PanelButtons, PwmFanDriver};
use crate::telemetry::{self, STATUS_INTERVAL_TICKS};

/// Resolution at which the tick gate is polled.
const GATE_POLL: Duration = Duration::from_millis(1);

/// Board-side state sampled by the control loop.
pub struct ControlIo {
    pub driver: PwmFanDriver,
    pub sensors: AdcSensors,
    pub buttons: PanelButtons,
}

#[embassy_executor::task]
pub async fn run(mut machine: ControlStateMachine<I2cEeprom>, mut io: ControlIo) -> ! {
    let mut gate = TickGate::new(machine.config().tick_period_us);
    let mut ticker = Ticker::every(GATE_POLL);
    let mut rx = [0u8; SCAN_WINDOW];
    let mut cursor = 0;
    let mut ticks: u32 = 0;

    loop {
        ticker.next().await;
        let now = now_us();
        if !gate.poll(now) {
            continue;
        }

        let received = SERIAL.take_received(&mut rx);
        let inputs = TickInputs {
            now_us: now,
            edges: [EDGE_TIMERS[0].sample(), EDGE_TIMERS[1].sample()],
            temperatures: io.sensors.read(),
            buttons: io.buttons.read(),
            serial_rx: &rx[..received],
        };
        let report = machine.tick(&inputs, &mut io.driver);

        let mut dropped = 0;
        if let Some(banner) = report.banner {
            dropped += SERIAL.send_banner(banner);
        }
        dropped += SERIAL.send(&report.echo);
        if dropped > 0 {
            defmt::warn!("serial: tx pipe full, dropped {=usize} bytes", dropped);
        }

        cursor = telemetry::drain(machine.telemetry(), cursor);
        ticks = ticks.wrapping_add(1);
        if ticks % STATUS_INTERVAL_TICKS == 0 {
            match machine.snapshot() {
                Ok(snapshot) => telemetry::log_status(&snapshot),
                Err(error) => defmt::warn!("status: {}", defmt::Debug2Format(&error)),
            }
        }
    }
}
