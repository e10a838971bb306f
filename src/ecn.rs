//! Explicit Congestion Notification (ECN) codepoints and per-connection ECN state
//!
//! L4S traffic is told apart from classic ECN traffic by its codepoint: a
//! Prague sender marks outgoing segments ECT(1) unless configured for ECT(0).

use serde::{Deserialize, Serialize};

/// ECN codepoints as defined in RFC 3168
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EcnCodepoint {
    /// Not ECN-Capable Transport (Not-ECT)
    #[default]
    NotEct = 0b00,
    /// ECN-Capable Transport (0) (ECT(0))
    Ect0 = 0b10,
    /// ECN-Capable Transport (1) (ECT(1)), reserved for L4S
    Ect1 = 0b01,
    /// Congestion Experienced (CE)
    Ce = 0b11,
}

impl EcnCodepoint {
    /// Parse ECN bits from IP TOS/Traffic Class field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::NotEct,
            0b10 => Self::Ect0,
            0b01 => Self::Ect1,
            _ => Self::Ce,
        }
    }

    /// Convert to bits for IP TOS/Traffic Class field
    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// Codepoint an L4S sender advertises
    pub fn for_l4s(use_ect0: bool) -> Self {
        if use_ect0 { Self::Ect0 } else { Self::Ect1 }
    }

    /// Check if ECN capable
    pub fn is_ect(self) -> bool {
        matches!(self, Self::Ect0 | Self::Ect1)
    }

    /// Check if congestion experienced
    pub fn is_ce(self) -> bool {
        self == Self::Ce
    }
}

/// How the connection interprets CE feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcnMode {
    /// RFC 3168: one ECE per window, halve on echo
    #[default]
    Classic,
    /// DCTCP/Prague: echo every CE transition, scale reaction by alpha
    Dctcp,
}

/// ECN progress of one connection, shared with the receive path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcnState {
    #[default]
    Idle,
    /// Last received segment carried a CE mark
    CeRcvd,
    /// Receiver is setting ECE on outgoing ACKs
    SendingEce,
    /// Sender got an ECE echo
    EceRcvd,
    /// Sender reduced its window and set CWR
    CwrSent,
}
