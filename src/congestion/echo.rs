//! Receiver-side CE echo bookkeeping
//!
//! A delayed ACK may cover segments on both sides of a CE marking boundary.
//! When the marking state flips while a delayed ACK is pending, the ACK that
//! would have gone out for the segments before the flip is sent right away,
//! acknowledging the sequence number recorded at the previous flip and
//! carrying ECE exactly when those segments were CE-marked.

use crate::socket::{ControlPacket, SequenceNumber};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoState {
    #[default]
    Idle,
    CeMarked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcnEchoStateMachine {
    state: EchoState,
    prior_rcv_nxt: Option<SequenceNumber>,
    delayed_ack_reserved: bool,
}

impl EcnEchoStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EchoState {
        self.state
    }

    /// Receive sequence recorded at the last observed segment
    pub fn prior_rcv_nxt(&self) -> Option<SequenceNumber> {
        self.prior_rcv_nxt
    }

    pub fn delayed_ack_reserved(&self) -> bool {
        self.delayed_ack_reserved
    }

    pub fn set_delayed_ack_reserved(&mut self, reserved: bool) {
        self.delayed_ack_reserved = reserved;
    }

    /// A CE-marked segment arrived; `rcv_nxt` already accounts for it
    pub fn on_ce(&mut self, rcv_nxt: SequenceNumber) -> Option<ControlPacket> {
        self.transition(EchoState::CeMarked, rcv_nxt)
    }

    /// An unmarked segment arrived; `rcv_nxt` already accounts for it
    pub fn on_no_ce(&mut self, rcv_nxt: SequenceNumber) -> Option<ControlPacket> {
        self.transition(EchoState::Idle, rcv_nxt)
    }

    fn transition(&mut self, target: EchoState, rcv_nxt: SequenceNumber) -> Option<ControlPacket> {
        let packet = match self.prior_rcv_nxt {
            Some(prior) if self.state != target && self.delayed_ack_reserved => {
                // The pending ACK covers the segments before the flip, so it
                // echoes the state being left.
                let packet = match self.state {
                    EchoState::Idle => ControlPacket::ack(prior),
                    EchoState::CeMarked => ControlPacket::ack_with_ece(prior),
                };
                debug!("CE boundary {:?} -> {:?}: flushing delayed ACK at {} (ece={})",
                       self.state, target, prior, packet.has_ece());
                Some(packet)
            }
            _ => None,
        };

        self.prior_rcv_nxt = Some(rcv_nxt);
        self.state = target;
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_on_each_boundary() {
        let mut echo = EcnEchoStateMachine::new();
        echo.set_delayed_ack_reserved(true);

        // No snapshot yet
        assert_eq!(echo.on_no_ce(SequenceNumber(1000)), None);
        assert_eq!(echo.state(), EchoState::Idle);

        let packet = echo.on_ce(SequenceNumber(2000)).unwrap();
        assert_eq!(packet.ack, SequenceNumber(1000));
        assert!(!packet.has_ece());
        assert_eq!(echo.state(), EchoState::CeMarked);

        let packet = echo.on_no_ce(SequenceNumber(3000)).unwrap();
        assert_eq!(packet.ack, SequenceNumber(2000));
        assert!(packet.has_ece());
        assert_eq!(echo.state(), EchoState::Idle);
        assert_eq!(echo.prior_rcv_nxt(), Some(SequenceNumber(3000)));
    }

    #[test]
    fn test_no_delayed_ack_no_packet() {
        let mut echo = EcnEchoStateMachine::new();
        echo.on_no_ce(SequenceNumber(1000));

        assert_eq!(echo.on_ce(SequenceNumber(2000)), None);
        assert_eq!(echo.state(), EchoState::CeMarked);
        assert_eq!(echo.on_no_ce(SequenceNumber(3000)), None);
        assert_eq!(echo.state(), EchoState::Idle);
        assert_eq!(echo.prior_rcv_nxt(), Some(SequenceNumber(3000)));
    }

    #[test]
    fn test_first_ce_without_snapshot() {
        let mut echo = EcnEchoStateMachine::new();
        echo.set_delayed_ack_reserved(true);
        assert_eq!(echo.on_ce(SequenceNumber(500)), None);
        assert_eq!(echo.state(), EchoState::CeMarked);
        assert_eq!(echo.prior_rcv_nxt(), Some(SequenceNumber(500)));
    }

    #[test]
    fn test_repeated_mark_refreshes_snapshot_only() {
        let mut echo = EcnEchoStateMachine::new();
        echo.set_delayed_ack_reserved(true);
        echo.on_ce(SequenceNumber(100));
        assert_eq!(echo.on_ce(SequenceNumber(200)), None);
        assert_eq!(echo.prior_rcv_nxt(), Some(SequenceNumber(200)));

        let packet = echo.on_no_ce(SequenceNumber(300)).unwrap();
        assert_eq!(packet.ack, SequenceNumber(200));
    }
}
