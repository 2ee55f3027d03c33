#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Byte pipes between the UART task and the control loop.
//!
//! The UART task pushes received bytes into [`SerialLink::rx`]; the control
//! loop drains them once per tick and writes banners and echoed bytes into
//! [`SerialLink::tx`].

use core::fmt::Write as _;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::pipe::Pipe;
use fan_core::machine::Banner;
use fan_core::protocol::SCAN_WINDOW;
use heapless::String;

/// Capacity of each direction in bytes.
pub const SERIAL_PIPE_CAPACITY: usize = 128;

/// Longest banner line including the line terminator.
pub const BANNER_LINE_LEN: usize = 40;

#[cfg(target_os = "none")]
type SerialMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type SerialMutex = NoopRawMutex;

/// One direction of the serial link.
pub type SerialPipe = Pipe<SerialMutex, SERIAL_PIPE_CAPACITY>;

/// Both directions of the serial link.
pub struct SerialLink {
    pub rx: SerialPipe,
    pub tx: SerialPipe,
}

impl SerialLink {
    pub const fn new() -> Self {
        Self {
            rx: Pipe::new(),
            tx: Pipe::new(),
        }
    }

    /// Takes whatever the UART has received, up to one scan window.
    pub fn take_received(&self, buffer: &mut [u8; SCAN_WINDOW]) -> usize {
        self.rx.try_read(buffer).unwrap_or(0)
    }

    /// Queues bytes for transmission. Bytes that do not fit are dropped and
    /// their count returned.
    pub fn send(&self, mut bytes: &[u8]) -> usize {
        while !bytes.is_empty() {
            match self.tx.try_write(bytes) {
                Ok(written) => bytes = &bytes[written..],
                Err(_) => break,
            }
        }
        bytes.len()
    }

    /// Queues a banner line.
    pub fn send_banner(&self, banner: Banner) -> usize {
        self.send(banner_line(banner).as_bytes())
    }
}

/// Formats `banner` as a CRLF-terminated line.
pub fn banner_line(banner: Banner) -> String<BANNER_LINE_LEN> {
    let mut line = String::new();
    let _ = write!(line, "{banner}\r\n");
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use fan_core::machine::ControlMode;

    #[test]
    fn banner_lines_end_with_crlf() {
        assert_eq!(banner_line(Banner::Initializing).as_str(), "INITIALIZING...\r\n");
        assert_eq!(
            banner_line(Banner::Entering(ControlMode::DebugFanOnOff)).as_str(),
            "ENTERING DEBUG FAN ON/OFF STATE\r\n"
        );
    }

    #[test]
    fn received_bytes_are_drained_once() {
        let link = SerialLink::new();
        assert!(matches!(link.rx.try_write(b"DNRM"), Ok(4)));

        let mut buffer = [0; SCAN_WINDOW];
        assert_eq!(link.take_received(&mut buffer), 4);
        assert_eq!(&buffer[..4], b"DNRM");
        assert_eq!(link.take_received(&mut buffer), 0);
    }

    #[test]
    fn overflow_is_reported() {
        let link = SerialLink::new();
        let bytes = [b'x'; SERIAL_PIPE_CAPACITY + 5];
        assert_eq!(link.send(&bytes), 5);
    }
}
