//! Byte-window scanner that pulls debug frames out of the serial stream.
//!
//! The scanner holds a bounded window of received bytes. Each scan tries to
//! parse a frame at the head of the window: a complete frame is consumed, a
//! recognized but truncated frame waits for more bytes, and anything else
//! drops a single byte and retries at the next position.

use heapless::Vec;
use winnow::Partial;
use winnow::binary::le_u16;
use winnow::error::{ErrMode, ModalResult};
use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::take;

use super::{DebugFrame, DebugHeader, HEADER_LEN, PAYLOAD_WORDS, Payload};

/// Capacity of the receive window in bytes.
pub const SCAN_WINDOW: usize = 48;

type Input<'a> = Partial<&'a [u8]>;

fn header(input: &mut Input<'_>) -> ModalResult<DebugHeader, ()> {
    take(HEADER_LEN)
        .verify_map(DebugHeader::from_bytes)
        .parse_next(input)
}

fn payload(input: &mut Input<'_>) -> ModalResult<Payload, ()> {
    let mut words = [0u16; PAYLOAD_WORDS];
    for word in &mut words {
        *word = le_u16.parse_next(input)?;
    }
    Ok(words)
}

fn frame(input: &mut Input<'_>) -> ModalResult<DebugFrame, ()> {
    let header = header(input)?;
    let payload = if header.has_payload() {
        payload(input)?
    } else {
        [0; PAYLOAD_WORDS]
    };
    Ok(DebugFrame::new(header, payload))
}

/// Result of parsing at the head of a byte slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStep {
    /// A frame spanning the first `consumed` bytes.
    Frame { frame: DebugFrame, consumed: usize },
    /// A header prefix or truncated frame; more bytes are needed.
    Incomplete,
    /// The head byte cannot start a frame.
    Mismatch,
}

/// Attempts to parse one frame starting at `bytes[0]`.
#[must_use]
pub fn parse_frame(bytes: &[u8]) -> ParseStep {
    // A short head that cannot grow into any tag is rejected without waiting.
    if bytes.len() < HEADER_LEN
        && !DebugHeader::ALL
            .iter()
            .any(|header| header.tag().starts_with(bytes))
    {
        return ParseStep::Mismatch;
    }

    let mut input = Partial::new(bytes);
    let start = input.eof_offset();
    match frame(&mut input) {
        Ok(frame) => ParseStep::Frame {
            frame,
            consumed: start - input.eof_offset(),
        },
        Err(ErrMode::Incomplete(_)) => ParseStep::Incomplete,
        Err(_) => ParseStep::Mismatch,
    }
}

/// Bounded receive window scanned once per tick.
#[derive(Clone, Debug, Default)]
pub struct FrameScanner {
    window: Vec<u8, SCAN_WINDOW>,
}

impl FrameScanner {
    #[must_use]
    pub const fn new() -> Self {
        Self { window: Vec::new() }
    }

    /// Appends received bytes, evicting the oldest when the window is full.
    ///
    /// Returns the number of evicted bytes.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut evicted = 0;
        for &byte in bytes {
            if self.window.is_full() {
                self.discard_front(1);
                evicted += 1;
            }
            let _ = self.window.push(byte);
        }
        evicted
    }

    /// Extracts the first complete frame in the window.
    ///
    /// Bytes skipped on the way are handed to `on_skip` in arrival order.
    /// Bytes after the frame stay buffered for the next scan.
    pub fn scan(&mut self, mut on_skip: impl FnMut(u8)) -> Option<DebugFrame> {
        while let Some(&head) = self.window.first() {
            match parse_frame(&self.window) {
                ParseStep::Frame { frame, consumed } => {
                    self.discard_front(consumed);
                    return Some(frame);
                }
                ParseStep::Incomplete => return None,
                ParseStep::Mismatch => {
                    on_skip(head);
                    self.discard_front(1);
                }
            }
        }
        None
    }

    /// Bytes waiting in the window.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.window
    }

    /// Empties the window.
    pub fn clear(&mut self) {
        self.window.clear();
    }

    fn discard_front(&mut self, count: usize) {
        let len = self.window.len();
        let count = count.min(len);
        self.window.copy_within(count.., 0);
        self.window.truncate(len - count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FRAME_LEN;

    fn frame_bytes(tag: &[u8; 4]) -> std::vec::Vec<u8> {
        let mut bytes = tag.to_vec();
        for word in 1..=8u16 {
            bytes.extend_from_slice(&(word * 0x0101).to_le_bytes());
        }
        bytes
    }

    #[test]
    fn parses_frame_at_head() {
        let bytes = frame_bytes(b"DTB1");
        match parse_frame(&bytes) {
            ParseStep::Frame { frame, consumed } => {
                assert_eq!(consumed, FRAME_LEN);
                assert_eq!(frame.header, DebugHeader::Table1);
                assert_eq!(frame.payload[2], 0x0303);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn header_prefix_waits() {
        assert_eq!(parse_frame(b"DP"), ParseStep::Incomplete);
        assert_eq!(parse_frame(b"DPI1\x00"), ParseStep::Incomplete);
        assert_eq!(parse_frame(b"DPX1"), ParseStep::Mismatch);
        assert_eq!(parse_frame(b"xy"), ParseStep::Mismatch);
    }

    #[test]
    fn skips_garbage_and_reports_it() {
        let mut scanner = FrameScanner::new();
        scanner.feed(b"hi!");
        scanner.feed(&frame_bytes(b"DBTN"));

        let mut skipped = std::vec::Vec::new();
        let frame = scanner.scan(|byte| skipped.push(byte)).expect("frame");

        assert_eq!(frame.header, DebugHeader::Buttons);
        assert_eq!(skipped, b"hi!");
        assert!(scanner.pending().is_empty());
    }

    #[test]
    fn keeps_trailing_bytes_for_next_scan() {
        let mut scanner = FrameScanner::new();
        scanner.feed(&frame_bytes(b"DPI2"));
        scanner.feed(b"DNRMxyzDT");

        assert_eq!(
            scanner.scan(|_| {}).map(|frame| frame.header),
            Some(DebugHeader::Pi2)
        );
        assert_eq!(
            scanner.scan(|_| {}).map(|frame| frame.header),
            Some(DebugHeader::Normal)
        );
        assert_eq!(scanner.pending(), b"xyzDT");
        assert_eq!(scanner.scan(|_| {}), None);
        assert_eq!(scanner.pending(), b"DT");
    }

    #[test]
    fn full_window_evicts_oldest() {
        let mut scanner = FrameScanner::new();
        let filler = [b'.'; SCAN_WINDOW];
        assert_eq!(scanner.feed(&filler), 0);
        assert_eq!(scanner.feed(b"DN"), 2);
        assert_eq!(scanner.pending().len(), SCAN_WINDOW);
        assert_eq!(&scanner.pending()[SCAN_WINDOW - 2..], b"DN");
    }
}
