//! Per-connection congestion session
//!
//! [`CongestionSession`] is the piece a transport embeds: it owns the
//! [`SocketState`], the [`Controller`], the ACE mailbox and the queue of
//! control packets the controller asked for. The transport feeds it ACKs and
//! events in timeline order and drains [`CongestionSession::poll_control_packet`]
//! after each call.

use crate::ace::{find_ace_option, AceOption, CeByteMailbox};
use crate::config::PragueConfig;
use crate::congestion::{create_controller, AckSample, CongestionDebugState, CongestionOps, Controller};
use crate::error::Result;
use crate::socket::{CaEvent, CongestionState, ControlPacket, SequenceNumber, SocketState};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Smoothed RTT kept the RFC 6298 way
#[derive(Debug, Clone, Default)]
struct RttStats {
    smoothed_rtt: Option<Duration>,
    rtt_var: Duration,
}

impl RttStats {
    fn update(&mut self, sample: Duration) -> Duration {
        let smoothed = match self.smoothed_rtt {
            None => {
                self.rtt_var = sample / 2;
                sample
            }
            Some(srtt) => {
                let diff = if srtt > sample { srtt - sample } else { sample - srtt };
                self.rtt_var = (self.rtt_var * 3 + diff) / 4;
                (srtt * 7 + sample) / 8
            }
        };
        self.smoothed_rtt = Some(smoothed);
        smoothed
    }
}

#[derive(Debug, Clone)]
pub struct CongestionSession {
    tcb: SocketState,
    controller: Controller,
    mailbox: CeByteMailbox,
    rtt: RttStats,
    outbox: VecDeque<ControlPacket>,
}

impl CongestionSession {
    /// Build the socket state and attach the configured controller
    pub fn new(config: &PragueConfig) -> Result<Self> {
        config.validate()?;

        let mut controller = create_controller(config)?;
        let mut tcb = SocketState::new(config.segment_size, config.initial_cwnd());
        controller.init(&mut tcb);

        Ok(Self {
            tcb,
            controller,
            mailbox: CeByteMailbox::new(),
            rtt: RttStats::default(),
            outbox: VecDeque::new(),
        })
    }

    /// Pick the ACE option out of a received segment's option list, if any
    pub fn on_segment_options(&mut self, options: &[u8]) {
        if let Some(ace) = find_ace_option(options) {
            self.on_ace_option(ace);
        }
    }

    pub fn on_ace_option(&mut self, option: AceOption) {
        debug!("Received {}", option);
        self.mailbox.deposit(option);
    }

    /// Process one acknowledgment cycle.
    ///
    /// The mailbox is emptied here whether or not the controller uses it.
    pub fn on_ack(&mut self, segments_acked: u32, rtt: Duration, bytes_acked_sacked: u32) {
        if !rtt.is_zero() {
            self.tcb.srtt = self.rtt.update(rtt);
        }

        let sample = AckSample {
            segments_acked,
            rtt,
            ce_bytes: self.mailbox.take(),
            bytes_acked_sacked,
        };
        self.controller.on_ack(&mut self.tcb, &sample);
    }

    /// Move to a new congestion state.
    ///
    /// Entering CWR sets ssthresh from the bytes in flight; returning to Open
    /// from CWR lands cwnd on that threshold.
    pub fn set_congestion_state(&mut self, state: CongestionState, bytes_in_flight: u32) {
        let previous = self.tcb.cong_state;
        if previous == state {
            return;
        }

        if state == CongestionState::Cwr {
            self.tcb.ssthresh = self.controller.ss_thresh(&self.tcb, bytes_in_flight);
        }

        self.tcb.cong_state = state;
        debug!("Congestion state {:?} -> {:?}: cwnd={} ssthresh={}",
               previous, state, self.tcb.cwnd, self.tcb.ssthresh);

        if previous == CongestionState::Cwr && state == CongestionState::Open {
            self.tcb.cwnd = self.tcb.ssthresh.max(self.tcb.min_window());
            self.on_event(CaEvent::CompleteCwr);
        }
    }

    pub fn on_event(&mut self, event: CaEvent) {
        if let Some(packet) = self.controller.cwnd_event(&mut self.tcb, event) {
            self.outbox.push_back(packet);
        }
    }

    /// Next control packet to transmit, oldest first
    pub fn poll_control_packet(&mut self) -> Option<ControlPacket> {
        self.outbox.pop_front()
    }

    pub fn set_rcv_nxt(&mut self, seq: SequenceNumber) {
        self.tcb.rcv_nxt = seq;
    }

    pub fn set_next_tx_sequence(&mut self, seq: SequenceNumber) {
        self.tcb.next_tx_sequence = seq;
    }

    /// Independent deep copy
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn cwnd(&self) -> u32 {
        self.tcb.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.tcb.ssthresh
    }

    /// Prague's alpha, `None` for other algorithms
    pub fn alpha(&self) -> Option<f64> {
        self.controller.as_prague().map(|prague| prague.alpha())
    }

    pub fn pending_ce_bytes(&self) -> u32 {
        self.mailbox.peek()
    }

    pub fn socket_state(&self) -> &SocketState {
        &self.tcb
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn debug_state(&self) -> CongestionDebugState {
        self.controller.debug_state(&self.tcb)
    }
}
