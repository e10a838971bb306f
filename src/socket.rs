//! Transport-side congestion state handed to the controller on every call
//!
//! The connection owns a [`SocketState`]; a controller only ever sees it
//! through `&mut` for the duration of one acknowledgment or one event.

use crate::ecn::{EcnCodepoint, EcnMode, EcnState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// TCP header flag bits used on emitted control packets
pub const TCP_FLAG_ACK: u8 = 0x10;
pub const TCP_FLAG_ECE: u8 = 0x40;

/// 32-bit TCP sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(pub u32);

impl SequenceNumber {
    pub fn wrapping_add(self, bytes: u32) -> Self {
        SequenceNumber(self.0.wrapping_add(bytes))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Congestion state of the connection, driven by the loss-recovery machinery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionState {
    #[default]
    Open,
    /// Duplicate ACKs or SACK holes seen, no reduction yet
    Disorder,
    /// Window reduced in response to an ECN echo
    Cwr,
    /// Fast recovery after loss
    Recovery,
    /// Retransmission timeout
    Loss,
}

impl CongestionState {
    /// Recovery and Loss freeze the congestion estimate and window growth
    pub fn is_recovering(self) -> bool {
        matches!(self, Self::Recovery | Self::Loss)
    }
}

/// Discrete events the connection reports to its controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaEvent {
    /// First transmission when no packets are in flight
    TxStart,
    /// Window restarted after idle
    CwndRestart,
    /// CWR state completed
    CompleteCwr,
    /// Loss detected
    Loss,
    /// Received segment without CE after CE ones
    EcnNoCe,
    /// Received a CE-marked segment
    EcnIsCe,
    /// A delayed ACK was scheduled
    DelayedAck,
    /// An ACK went out immediately
    NonDelayedAck,
}

/// An ACK-only segment the controller asks the connection to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPacket {
    /// Acknowledgment number to advertise
    pub ack: SequenceNumber,
    pub flags: u8,
}

impl ControlPacket {
    pub fn ack(ack: SequenceNumber) -> Self {
        Self { ack, flags: TCP_FLAG_ACK }
    }

    pub fn ack_with_ece(ack: SequenceNumber) -> Self {
        Self { ack, flags: TCP_FLAG_ACK | TCP_FLAG_ECE }
    }

    pub fn has_ece(&self) -> bool {
        self.flags & TCP_FLAG_ECE != 0
    }
}

/// Window and ECN state of one connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketState {
    /// Congestion window in bytes
    pub cwnd: u32,
    /// Slow start threshold in bytes
    pub ssthresh: u32,
    pub segment_size: u32,
    pub cong_state: CongestionState,
    pub ecn_enabled: bool,
    pub ecn_mode: EcnMode,
    pub ecn_state: EcnState,
    /// Codepoint stamped on outgoing data
    pub ect_codepoint: EcnCodepoint,
    /// Smoothed RTT maintained by the connection
    pub srtt: Duration,
    /// Next sequence number expected from the peer
    pub rcv_nxt: SequenceNumber,
    pub next_tx_sequence: SequenceNumber,
}

impl SocketState {
    pub fn new(segment_size: u32, initial_cwnd: u32) -> Self {
        Self {
            cwnd: initial_cwnd,
            ssthresh: u32::MAX,
            segment_size,
            cong_state: CongestionState::Open,
            ecn_enabled: false,
            ecn_mode: EcnMode::Classic,
            ecn_state: EcnState::Idle,
            ect_codepoint: EcnCodepoint::NotEct,
            srtt: Duration::ZERO,
            rcv_nxt: SequenceNumber(0),
            next_tx_sequence: SequenceNumber(0),
        }
    }

    /// Floor for every window reduction
    pub fn min_window(&self) -> u32 {
        self.segment_size.saturating_mul(2)
    }

    /// Set ssthresh to `target` (never below the floor) and cut cwnd to it
    pub fn reduce_to(&mut self, target: u32) {
        self.ssthresh = target.max(self.min_window());
        self.cwnd = self.ssthresh;
    }

    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}
