//! Linux-style Reno: slow start, additive increase, halving on loss

use super::{AckSample, CongestionOps};
use crate::socket::{CaEvent, CongestionState, ControlPacket, SocketState};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct Reno {
    /// Segments acknowledged toward the next one-segment increase
    cwnd_cnt: u32,
}

impl Reno {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow toward ssthresh, returning the acked segments left over
    fn slow_start(&mut self, tcb: &mut SocketState, segments_acked: u32) -> u32 {
        let segment = tcb.segment_size.max(1);
        let wanted = tcb.cwnd.saturating_add(segments_acked.saturating_mul(segment));
        let new_cwnd = wanted.min(tcb.ssthresh);
        let used = (new_cwnd - tcb.cwnd).div_ceil(segment);
        tcb.cwnd = new_cwnd;

        debug!("Slow start: cwnd increased to {}", tcb.cwnd);
        segments_acked.saturating_sub(used)
    }

    /// One segment per window's worth of acknowledged segments
    fn congestion_avoidance(&mut self, tcb: &mut SocketState, segments_acked: u32) {
        let segment = tcb.segment_size.max(1);
        let window = (tcb.cwnd / segment).max(1);

        if self.cwnd_cnt >= window {
            self.cwnd_cnt = 0;
            tcb.cwnd = tcb.cwnd.saturating_add(segment);
        }

        self.cwnd_cnt = self.cwnd_cnt.saturating_add(segments_acked);
        if self.cwnd_cnt >= window {
            let delta = self.cwnd_cnt / window;
            self.cwnd_cnt -= delta * window;
            tcb.cwnd = tcb.cwnd.saturating_add(delta.saturating_mul(segment));
            debug!("Congestion avoidance: cwnd increased to {}", tcb.cwnd);
        }
    }
}

impl CongestionOps for Reno {
    fn name(&self) -> &'static str {
        "TcpLinuxReno"
    }

    fn ss_thresh(&self, tcb: &SocketState, bytes_in_flight: u32) -> u32 {
        tcb.min_window().max(bytes_in_flight / 2)
    }

    fn on_ack(&mut self, tcb: &mut SocketState, sample: &AckSample) {
        if !matches!(tcb.cong_state, CongestionState::Open | CongestionState::Disorder) {
            return;
        }

        let mut segments = sample.segments_acked;
        if tcb.in_slow_start() {
            segments = self.slow_start(tcb, segments);
        }
        if !tcb.in_slow_start() && segments > 0 {
            self.congestion_avoidance(tcb, segments);
        }
    }

    fn cwnd_event(&mut self, tcb: &mut SocketState, event: CaEvent) -> Option<ControlPacket> {
        if event == CaEvent::Loss {
            tcb.reduce_to(tcb.cwnd / 2);
            self.cwnd_cnt = 0;
            info!("Loss: halving to cwnd={}", tcb.cwnd);
        }
        None
    }
}
