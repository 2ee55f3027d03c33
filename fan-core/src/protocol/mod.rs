//! Binary debug protocol carried over the serial link.
//!
//! A frame is a four-byte ASCII header followed by eight little-endian 16-bit
//! words:
//!
//! ```text
//! +--------+--------+--------+-----+--------+
//! | HEADER | WORD0  | WORD1  | ... | WORD7  |
//! | 4 B    | 2 B    | 2 B    |     | 2 B    |
//! +--------+--------+--------+-----+--------+
//! ```
//!
//! There is no checksum. The header selects a [`ControlMode`]; the words are
//! interpreted by that mode. `DNRM` is the only header without a payload.

use heapless::Vec;

use crate::machine::ControlMode;

mod scanner;

pub use scanner::{FrameScanner, ParseStep, SCAN_WINDOW, parse_frame};

/// Header length in bytes.
pub const HEADER_LEN: usize = 4;
/// Number of payload words.
pub const PAYLOAD_WORDS: usize = 8;
/// Length of a frame carrying a payload.
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_WORDS * 2;

/// Payload words in transmission order.
pub type Payload = [u16; PAYLOAD_WORDS];

/// Recognized frame headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugHeader {
    Pi1,
    Pi2,
    Buttons,
    Temp,
    FanOnOff,
    Table1,
    Table2,
    Normal,
}

impl DebugHeader {
    /// Every header, in matching order.
    pub const ALL: [DebugHeader; 8] = [
        DebugHeader::Pi1,
        DebugHeader::Pi2,
        DebugHeader::Buttons,
        DebugHeader::Temp,
        DebugHeader::FanOnOff,
        DebugHeader::Table1,
        DebugHeader::Table2,
        DebugHeader::Normal,
    ];

    /// ASCII tag on the wire.
    #[must_use]
    pub const fn tag(self) -> &'static [u8; HEADER_LEN] {
        match self {
            DebugHeader::Pi1 => b"DPI1",
            DebugHeader::Pi2 => b"DPI2",
            DebugHeader::Buttons => b"DBTN",
            DebugHeader::Temp => b"DTMP",
            DebugHeader::FanOnOff => b"DFON",
            DebugHeader::Table1 => b"DTB1",
            DebugHeader::Table2 => b"DTB2",
            DebugHeader::Normal => b"DNRM",
        }
    }

    /// Matches a four-byte tag.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|header| header.tag().as_slice() == bytes)
    }

    /// Case-insensitive lookup by tag text.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|header| tag.as_bytes().eq_ignore_ascii_case(header.tag()))
    }

    /// Mode the header requests.
    #[must_use]
    pub const fn mode(self) -> ControlMode {
        match self {
            DebugHeader::Pi1 => ControlMode::DebugPi1,
            DebugHeader::Pi2 => ControlMode::DebugPi2,
            DebugHeader::Buttons => ControlMode::DebugButtons,
            DebugHeader::Temp => ControlMode::DebugTemp,
            DebugHeader::FanOnOff => ControlMode::DebugFanOnOff,
            DebugHeader::Table1 => ControlMode::DebugTable1,
            DebugHeader::Table2 => ControlMode::DebugTable2,
            DebugHeader::Normal => ControlMode::Normal,
        }
    }

    /// Returns `false` for headers sent without payload words.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        !matches!(self, DebugHeader::Normal)
    }

    /// Bytes on the wire including the header.
    #[must_use]
    pub const fn frame_len(self) -> usize {
        if self.has_payload() {
            FRAME_LEN
        } else {
            HEADER_LEN
        }
    }
}

/// Parsed frame: header plus payload (all zero for payload-less headers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugFrame {
    pub header: DebugHeader,
    pub payload: Payload,
}

impl DebugFrame {
    #[must_use]
    pub const fn new(header: DebugHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    /// Serializes the frame as it appears on the wire.
    #[must_use]
    pub fn encode(&self) -> Vec<u8, FRAME_LEN> {
        let mut bytes = Vec::new();
        let _ = bytes.extend_from_slice(self.header.tag());
        if self.header.has_payload() {
            for word in self.payload {
                let _ = bytes.extend_from_slice(&word.to_le_bytes());
            }
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_resolve_to_headers() {
        for header in DebugHeader::ALL {
            assert_eq!(DebugHeader::from_bytes(header.tag()), Some(header));
        }
        assert_eq!(DebugHeader::from_bytes(b"DPI3"), None);
        assert_eq!(DebugHeader::from_tag("dtb2"), Some(DebugHeader::Table2));
    }

    #[test]
    fn encode_places_words_little_endian() {
        let mut payload = [0; PAYLOAD_WORDS];
        payload[0] = 0x0201;
        payload[7] = 0xBEEF;
        let bytes = DebugFrame::new(DebugHeader::Pi2, payload).encode();

        assert_eq!(bytes.len(), FRAME_LEN);
        assert_eq!(&bytes[..6], b"DPI2\x01\x02");
        assert_eq!(&bytes[18..], &[0xEF, 0xBE]);
    }

    #[test]
    fn normal_frame_is_header_only() {
        let bytes = DebugFrame::new(DebugHeader::Normal, [0; PAYLOAD_WORDS]).encode();
        assert_eq!(bytes.as_slice(), b"DNRM");
    }
}
