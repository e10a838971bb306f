//! Accurate ECN (ACE) option
//!
//! The receiver reports how many payload bytes arrived with a CE mark in a
//! fixed six byte TCP option:
//!
//! ```text
//! +------+--------+-------------------------------+
//! | kind | length |  CE bytes (network byte order) |
//! +------+--------+-------------------------------+
//!    0       1                2 .. 5
//! ```
//!
//! Kind 15 sits in the experimental option space and the length is always 6.

use crate::error::{OptionError, Result};
use bytes::{Buf, BufMut};
use std::fmt;
use tracing::{trace, warn};

/// Option kind carrying the CE byte count
pub const ACE_OPTION_KIND: u8 = 15;

/// Serialized size of the option, kind and length bytes included
pub const ACE_OPTION_LEN: u8 = 6;

const OPT_END: u8 = 0;
const OPT_NOP: u8 = 1;

/// The CE byte count carried by one ACE option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AceOption {
    pub ce_bytes: u32,
}

impl AceOption {
    pub fn new(ce_bytes: u32) -> Self {
        Self { ce_bytes }
    }

    pub fn kind(&self) -> u8 {
        ACE_OPTION_KIND
    }

    pub fn serialized_len(&self) -> usize {
        ACE_OPTION_LEN as usize
    }

    /// Encode into the fixed wire record
    pub fn encode(&self) -> [u8; ACE_OPTION_LEN as usize] {
        let mut out = [0u8; ACE_OPTION_LEN as usize];
        let mut buf = &mut out[..];
        self.write_to(&mut buf);
        out
    }

    /// Append the option to an outgoing header buffer
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(ACE_OPTION_KIND);
        buf.put_u8(ACE_OPTION_LEN);
        buf.put_u32(self.ce_bytes);
    }

    /// Decode an option starting at the kind byte.
    ///
    /// Bytes past the sixth are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        if buf.remaining() < 2 {
            return Err(OptionError::Truncated { len: bytes.len() }.into());
        }

        let kind = buf.get_u8();
        if kind != ACE_OPTION_KIND {
            return Err(OptionError::UnexpectedKind(kind).into());
        }

        let len = buf.get_u8();
        if len != ACE_OPTION_LEN {
            return Err(OptionError::UnexpectedLength(len).into());
        }

        if buf.remaining() < 4 {
            return Err(OptionError::Truncated { len: bytes.len() }.into());
        }

        Ok(Self {
            ce_bytes: buf.get_u32(),
        })
    }
}

impl fmt::Display for AceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ACE (CE-Bytes={})", self.ce_bytes)
    }
}

/// Find the ACE option in a TCP option list.
///
/// Unknown options are stepped over. A malformed ACE option is dropped and
/// the scan continues; a list whose length bytes no longer line up ends the
/// scan. Neither case is an error for the connection.
pub fn find_ace_option(mut options: &[u8]) -> Option<AceOption> {
    while let Some(&kind) = options.first() {
        match kind {
            OPT_END => break,
            OPT_NOP => {
                options = &options[1..];
                continue;
            }
            _ => {}
        }

        let Some(&len) = options.get(1) else {
            warn!("Truncated TCP option list at kind {}", kind);
            break;
        };

        let len = usize::from(len);
        if len < 2 || len > options.len() {
            warn!("Malformed TCP option list: kind={} length={} remaining={}",
                  kind, len, options.len());
            break;
        }

        let (option, rest) = options.split_at(len);
        if kind == ACE_OPTION_KIND {
            match AceOption::decode(option) {
                Ok(ace) => return Some(ace),
                Err(e) => warn!("Skipping ACE option: {}", e),
            }
        } else {
            trace!(kind, len, "skipping TCP option");
        }
        options = rest;
    }

    None
}

/// Holds the latest received CE byte count until the next ACK cycle takes it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CeByteMailbox {
    pending: u32,
}

impl CeByteMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a received option, replacing a value nobody has taken yet
    pub fn deposit(&mut self, option: AceOption) {
        self.pending = option.ce_bytes;
    }

    pub fn peek(&self) -> u32 {
        self.pending
    }

    /// Read the pending count and leave zero behind
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PragueError;

    #[test]
    fn test_wire_layout() {
        let encoded = AceOption::new(0x0102_0304).encode();
        assert_eq!(encoded, [15, 6, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_roundtrip_edge_values() {
        for value in [0, 1, 1448, 0x00ff_ff00, u32::MAX - 1, u32::MAX] {
            let decoded = AceOption::decode(&AceOption::new(value).encode()).unwrap();
            assert_eq!(decoded.ce_bytes, value);
        }
    }

    #[test]
    fn test_write_to_appends() {
        let mut buf = Vec::new();
        buf.put_u8(OPT_NOP);
        AceOption::new(7).write_to(&mut buf);
        assert_eq!(buf, vec![1, 15, 6, 0, 0, 0, 7]);
    }

    #[test]
    fn test_decode_rejects_wrong_kind() {
        let err = AceOption::decode(&[14, 6, 0, 0, 0, 1]).unwrap_err();
        assert_eq!(err, PragueError::MalformedOption(OptionError::UnexpectedKind(14)));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = AceOption::decode(&[15, 10, 0, 0, 0, 1]).unwrap_err();
        assert_eq!(err, PragueError::MalformedOption(OptionError::UnexpectedLength(10)));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(AceOption::decode(&[]).is_err());
        assert!(AceOption::decode(&[15]).is_err());
        let err = AceOption::decode(&[15, 6, 0, 0]).unwrap_err();
        assert_eq!(err, PragueError::MalformedOption(OptionError::Truncated { len: 4 }));
    }

    #[test]
    fn test_display() {
        assert_eq!(AceOption::new(42).to_string(), "ACE (CE-Bytes=42)");
    }

    #[test]
    fn test_find_among_other_options() {
        // NOP, NOP, MSS 1448, ACE 3000, EOL
        let options = [1, 1, 2, 4, 0x05, 0xa8, 15, 6, 0, 0, 0x0b, 0xb8, 0];
        assert_eq!(find_ace_option(&options), Some(AceOption::new(3000)));
    }

    #[test]
    fn test_find_skips_malformed_ace() {
        // ACE with a bogus length of 4, followed by a good one
        let options = [15, 4, 0, 0, 15, 6, 0, 0, 0, 9];
        assert_eq!(find_ace_option(&options), Some(AceOption::new(9)));
    }

    #[test]
    fn test_find_stops_at_end_of_list() {
        let options = [0, 15, 6, 0, 0, 0, 9];
        assert_eq!(find_ace_option(&options), None);
    }

    #[test]
    fn test_find_handles_garbled_lengths() {
        assert_eq!(find_ace_option(&[2, 40, 0, 0]), None);
        assert_eq!(find_ace_option(&[3, 0, 15, 6, 0, 0, 0, 1]), None);
        assert_eq!(find_ace_option(&[8]), None);
    }

    #[test]
    fn test_mailbox_take_resets() {
        let mut mailbox = CeByteMailbox::new();
        mailbox.deposit(AceOption::new(500));
        mailbox.deposit(AceOption::new(700));
        assert_eq!(mailbox.peek(), 700);
        assert_eq!(mailbox.take(), 700);
        assert_eq!(mailbox.take(), 0);
    }
}
