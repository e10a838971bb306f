//! TCP Prague: DCTCP-style scalable congestion control driven by AccECN byte counts
//!
//! Every acknowledgment folds the reported CE byte count into `alpha`. A loss
//! seen while already in CWR is answered with a cut scaled by `alpha`; any
//! other loss halves the window. CE marks normally only move `alpha` and the
//! receiver echo state, unless the RTT has inflated enough to suspect a classic
//! bottleneck, in which case they halve the window like a loss.

use super::echo::EcnEchoStateMachine;
use super::estimator::{CongestionEstimator, EstimateSample, DEFAULT_GAIN, DEFAULT_INITIAL_ALPHA};
use super::fallback::FallbackDetector;
use super::{AckSample, CongestionDebugState, CongestionOps};
use crate::ecn::{EcnCodepoint, EcnMode, EcnState};
use crate::error::{PragueError, Result};
use crate::socket::{CaEvent, CongestionState, ControlPacket, SocketState};
use std::time::Duration;
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone)]
pub struct Prague {
    estimator: CongestionEstimator,
    fallback: FallbackDetector,
    echo: EcnEchoStateMachine,
    use_ect0: bool,
    initialized: bool,
    last_estimate: Option<EstimateSample>,
}

impl Default for Prague {
    fn default() -> Self {
        Self::new()
    }
}

fn check_unit_range(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PragueError::Config(format!("{} must be within [0, 1], got {}", name, value)));
    }
    Ok(())
}

impl Prague {
    pub fn new() -> Self {
        Self {
            estimator: CongestionEstimator::new(DEFAULT_INITIAL_ALPHA, DEFAULT_GAIN),
            fallback: FallbackDetector::new(),
            echo: EcnEchoStateMachine::new(),
            use_ect0: false,
            initialized: false,
            last_estimate: None,
        }
    }

    /// Set the starting alpha. Only valid before [`CongestionOps::init`].
    pub fn set_initial_alpha(&mut self, alpha: f64) -> Result<()> {
        if self.initialized {
            error!("Prague has already been initialized, refusing initial_alpha={}", alpha);
            return Err(PragueError::ConfigurationLocked("initial_alpha"));
        }
        check_unit_range("initial_alpha", alpha)?;
        self.estimator.set_alpha(alpha);
        Ok(())
    }

    /// Set the EWMA gain. Only valid before [`CongestionOps::init`].
    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        if self.initialized {
            error!("Prague has already been initialized, refusing gain={}", gain);
            return Err(PragueError::ConfigurationLocked("gain"));
        }
        check_unit_range("gain", gain)?;
        self.estimator.set_gain(gain);
        Ok(())
    }

    /// Choose ECT(0) instead of ECT(1); takes effect at init
    pub fn set_use_ect0(&mut self, use_ect0: bool) {
        self.use_ect0 = use_ect0;
    }

    pub fn use_ect0(&self) -> bool {
        self.use_ect0
    }

    pub fn alpha(&self) -> f64 {
        self.estimator.alpha()
    }

    pub fn gain(&self) -> f64 {
        self.estimator.gain()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn in_fallback(&self) -> bool {
        self.fallback.is_active()
    }

    pub fn base_rtt(&self) -> Option<Duration> {
        self.fallback.base_rtt()
    }

    pub fn last_estimate(&self) -> Option<EstimateSample> {
        self.last_estimate
    }

    pub fn echo(&self) -> &EcnEchoStateMachine {
        &self.echo
    }

    fn ce_state_0_to_1(&mut self, tcb: &mut SocketState) -> Option<ControlPacket> {
        let packet = self.echo.on_ce(tcb.rcv_nxt);
        tcb.ecn_state = EcnState::CeRcvd;
        packet
    }

    fn ce_state_1_to_0(&mut self, tcb: &mut SocketState) -> Option<ControlPacket> {
        let packet = self.echo.on_no_ce(tcb.rcv_nxt);
        if matches!(tcb.ecn_state, EcnState::CeRcvd | EcnState::SendingEce) {
            tcb.ecn_state = EcnState::Idle;
        }
        packet
    }

    fn on_loss(&mut self, tcb: &mut SocketState) {
        if tcb.cong_state == CongestionState::Cwr {
            let factor = (2.0 + self.alpha()) / 4.0;
            let target = (f64::from(tcb.cwnd) * factor) as u32;
            tcb.reduce_to(target);
            info!("Loss in CWR: alpha={:.4} factor={:.4} cwnd={}",
                  self.alpha(), factor, tcb.cwnd);
        } else {
            tcb.reduce_to(tcb.cwnd / 2);
            info!("Loss: halving to cwnd={}", tcb.cwnd);
        }
    }
}

impl CongestionOps for Prague {
    fn name(&self) -> &'static str {
        "TcpPrague"
    }

    fn init(&mut self, tcb: &mut SocketState) {
        tcb.ecn_enabled = true;
        tcb.ecn_mode = EcnMode::Dctcp;
        tcb.ect_codepoint = EcnCodepoint::for_l4s(self.use_ect0);
        self.initialized = true;
        info!("Prague enabled: ect={:?} alpha={} gain={}",
              tcb.ect_codepoint, self.alpha(), self.gain());
    }

    /// Classic halving of the bytes in flight, used on entering CWR.
    fn ss_thresh(&self, tcb: &SocketState, bytes_in_flight: u32) -> u32 {
        tcb.min_window().max(bytes_in_flight / 2)
    }

    fn on_ack(&mut self, tcb: &mut SocketState, sample: &AckSample) {
        if tcb.cong_state.is_recovering() {
            trace!("{:?}: estimate and window frozen", tcb.cong_state);
            return;
        }

        self.fallback.on_rtt_sample(sample.rtt, tcb.srtt);

        if sample.ce_bytes > 0 {
            debug!("AccECN: {} CE bytes of {} acked", sample.ce_bytes, sample.bytes_acked_sacked);
        }
        self.last_estimate = Some(self.estimator.update(sample.ce_bytes, sample.bytes_acked_sacked));

        if tcb.cong_state == CongestionState::Open {
            let segment = f64::from(tcb.segment_size);
            let adder = (segment * segment / f64::from(tcb.cwnd.max(1))).max(1.0);
            tcb.cwnd = tcb.cwnd.saturating_add(adder as u32);
            debug!("Open: cwnd grew by {} to {}", adder as u32, tcb.cwnd);
        }
    }

    fn cwnd_event(&mut self, tcb: &mut SocketState, event: CaEvent) -> Option<ControlPacket> {
        match event {
            CaEvent::Loss => {
                self.on_loss(tcb);
                None
            }
            CaEvent::EcnIsCe if self.fallback.is_active() => {
                tcb.reduce_to(tcb.cwnd / 2);
                info!("Classic fallback: CE mark halves cwnd to {}", tcb.cwnd);
                None
            }
            CaEvent::EcnIsCe => self.ce_state_0_to_1(tcb),
            CaEvent::EcnNoCe => self.ce_state_1_to_0(tcb),
            CaEvent::DelayedAck => {
                self.echo.set_delayed_ack_reserved(true);
                None
            }
            CaEvent::NonDelayedAck => {
                self.echo.set_delayed_ack_reserved(false);
                None
            }
            CaEvent::TxStart | CaEvent::CwndRestart | CaEvent::CompleteCwr => None,
        }
    }

    fn debug_state(&self, tcb: &SocketState) -> CongestionDebugState {
        let mut state = CongestionDebugState::from_socket(self.name(), tcb);
        state.alpha = Some(self.alpha());
        state.in_fallback = self.in_fallback();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SequenceNumber;

    fn socket(cwnd: u32) -> SocketState {
        SocketState::new(1448, cwnd)
    }

    fn ack(bytes: u32, ce_bytes: u32, rtt_ms: u64) -> AckSample {
        AckSample {
            segments_acked: 1,
            rtt: Duration::from_millis(rtt_ms),
            ce_bytes,
            bytes_acked_sacked: bytes,
        }
    }

    fn initialized(alpha: f64) -> (Prague, SocketState) {
        let mut prague = Prague::new();
        prague.set_initial_alpha(alpha).unwrap();
        let mut tcb = socket(100_000);
        prague.init(&mut tcb);
        (prague, tcb)
    }

    #[test]
    fn test_init_selects_codepoint() {
        let (_, tcb) = initialized(1.0);
        assert!(tcb.ecn_enabled);
        assert_eq!(tcb.ecn_mode, EcnMode::Dctcp);
        assert_eq!(tcb.ect_codepoint, EcnCodepoint::Ect1);

        let mut prague = Prague::new();
        prague.set_use_ect0(true);
        let mut tcb = socket(14480);
        prague.init(&mut tcb);
        assert_eq!(tcb.ect_codepoint, EcnCodepoint::Ect0);
    }

    #[test]
    fn test_initial_alpha_locked_after_init() {
        let (mut prague, _) = initialized(0.3);
        let err = prague.set_initial_alpha(0.5).unwrap_err();
        assert_eq!(err, PragueError::ConfigurationLocked("initial_alpha"));
        assert!(prague.set_gain(0.1).is_err());
        assert_eq!(prague.alpha(), 0.3);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut prague = Prague::new();
        assert!(matches!(prague.set_initial_alpha(1.5), Err(PragueError::Config(_))));
        assert!(matches!(prague.set_gain(-0.1), Err(PragueError::Config(_))));
        assert_eq!(prague.alpha(), DEFAULT_INITIAL_ALPHA);
    }

    #[test]
    fn test_loss_in_cwr_scales_with_alpha() {
        let (mut prague, mut tcb) = initialized(0.5);
        tcb.cong_state = CongestionState::Cwr;
        assert_eq!(prague.cwnd_event(&mut tcb, CaEvent::Loss), None);
        assert_eq!(tcb.ssthresh, 62_500);
        assert_eq!(tcb.cwnd, 62_500);
    }

    #[test]
    fn test_loss_outside_cwr_halves() {
        let (mut prague, mut tcb) = initialized(0.5);
        prague.cwnd_event(&mut tcb, CaEvent::Loss);
        assert_eq!(tcb.ssthresh, 50_000);
        assert_eq!(tcb.cwnd, 50_000);
    }

    #[test]
    fn test_loss_floor() {
        let (mut prague, mut tcb) = initialized(0.0);
        tcb.cwnd = 3000;
        prague.cwnd_event(&mut tcb, CaEvent::Loss);
        assert_eq!(tcb.cwnd, 2896);
        tcb.cong_state = CongestionState::Cwr;
        prague.cwnd_event(&mut tcb, CaEvent::Loss);
        assert_eq!(tcb.cwnd, 2896);
    }

    #[test]
    fn test_ss_thresh_ignores_alpha() {
        let (prague, tcb) = initialized(0.0);
        assert_eq!(prague.ss_thresh(&tcb, 80_000), 40_000);
        assert_eq!(prague.ss_thresh(&tcb, 1000), 2896);
    }

    #[test]
    fn test_ack_updates_alpha_and_grows() {
        let (mut prague, mut tcb) = initialized(1.0);
        tcb.srtt = Duration::from_millis(10);
        for _ in 0..5 {
            prague.on_ack(&mut tcb, &ack(1000, 0, 10));
        }
        assert!((prague.alpha() - 0.7242).abs() < 1e-4);
        // 1448^2 / ~100000 bytes per ACK
        assert!(tcb.cwnd > 100_000 && tcb.cwnd < 100_000 + 5 * 21);

        let estimate = prague.last_estimate().unwrap();
        assert_eq!(estimate.bytes_acked, 1000);
        assert_eq!(estimate.alpha, prague.alpha());
    }

    #[test]
    fn test_small_window_grows_at_least_one_byte() {
        let (mut prague, mut tcb) = initialized(1.0);
        tcb.segment_size = 1;
        tcb.cwnd = 1_000_000;
        prague.on_ack(&mut tcb, &ack(1, 0, 10));
        assert_eq!(tcb.cwnd, 1_000_001);
    }

    #[test]
    fn test_recovery_freezes_everything() {
        let (mut prague, mut tcb) = initialized(0.5);
        for state in [CongestionState::Recovery, CongestionState::Loss] {
            tcb.cong_state = state;
            prague.on_ack(&mut tcb, &ack(1448, 1448, 50));
            assert_eq!(prague.alpha(), 0.5);
            assert_eq!(tcb.cwnd, 100_000);
            assert_eq!(prague.base_rtt(), None);
        }
    }

    #[test]
    fn test_cwr_updates_alpha_without_growth() {
        let (mut prague, mut tcb) = initialized(0.0);
        tcb.cong_state = CongestionState::Cwr;
        prague.on_ack(&mut tcb, &ack(1000, 1000, 10));
        assert_eq!(prague.alpha(), DEFAULT_GAIN);
        assert_eq!(tcb.cwnd, 100_000);
    }

    #[test]
    fn test_ce_in_fallback_halves() {
        let (mut prague, mut tcb) = initialized(0.0);
        tcb.srtt = Duration::from_millis(10);
        prague.on_ack(&mut tcb, &ack(1000, 0, 10));
        tcb.srtt = Duration::from_millis(20);
        prague.on_ack(&mut tcb, &ack(1000, 0, 20));
        assert!(prague.in_fallback());

        let cwnd = tcb.cwnd;
        assert_eq!(prague.cwnd_event(&mut tcb, CaEvent::EcnIsCe), None);
        assert_eq!(tcb.cwnd, cwnd / 2);
        assert_eq!(tcb.ecn_state, EcnState::Idle);
    }

    #[test]
    fn test_ce_outside_fallback_is_soft() {
        let (mut prague, mut tcb) = initialized(0.0);
        prague.cwnd_event(&mut tcb, CaEvent::DelayedAck);
        tcb.rcv_nxt = SequenceNumber(1000);
        assert_eq!(prague.cwnd_event(&mut tcb, CaEvent::EcnNoCe), None);

        tcb.rcv_nxt = SequenceNumber(2448);
        let packet = prague.cwnd_event(&mut tcb, CaEvent::EcnIsCe).unwrap();
        assert_eq!(packet, ControlPacket::ack(SequenceNumber(1000)));
        assert_eq!(tcb.cwnd, 100_000);
        assert_eq!(tcb.ecn_state, EcnState::CeRcvd);

        tcb.rcv_nxt = SequenceNumber(3896);
        let packet = prague.cwnd_event(&mut tcb, CaEvent::EcnNoCe).unwrap();
        assert_eq!(packet, ControlPacket::ack_with_ece(SequenceNumber(2448)));
        assert_eq!(tcb.ecn_state, EcnState::Idle);
        assert_eq!(tcb.rcv_nxt, SequenceNumber(3896));
    }

    #[test]
    fn test_non_delayed_ack_suppresses_echo() {
        let (mut prague, mut tcb) = initialized(0.0);
        prague.cwnd_event(&mut tcb, CaEvent::DelayedAck);
        prague.cwnd_event(&mut tcb, CaEvent::NonDelayedAck);
        assert!(!prague.echo().delayed_ack_reserved());
        prague.cwnd_event(&mut tcb, CaEvent::EcnNoCe);
        assert_eq!(prague.cwnd_event(&mut tcb, CaEvent::EcnIsCe), None);
        assert_eq!(tcb.ecn_state, EcnState::CeRcvd);
    }

    #[test]
    fn test_clone_is_independent() {
        let (mut prague, mut tcb) = initialized(1.0);
        let forked = prague.clone();
        prague.on_ack(&mut tcb, &ack(1000, 0, 10));
        assert_eq!(forked.alpha(), 1.0);
        assert!(prague.alpha() < 1.0);
        assert!(forked.is_initialized());
    }
}
