#![cfg_attr(not(test), no_std)]

// Control logic for the dual-fan controller.
//
// Everything here is hardware independent so the same code runs in the
// firmware and in the host emulator. Hardware access goes through the
// `Storage` and `FanDriver` traits.

pub mod channel;
pub mod config;
pub mod edge;
pub mod machine;
pub mod pi;
pub mod protocol;
pub mod reference;
pub mod speed;
pub mod telemetry;
pub mod temperature;
pub mod tick;
