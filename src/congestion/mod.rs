//! Congestion control strategies
//!
//! Each algorithm implements [`CongestionOps`] against a borrowed
//! [`SocketState`]. The set of algorithms is closed: [`Controller`] is the
//! tagged union a connection stores, picked by [`CongestionAlgorithm`] through
//! [`create_controller`].

pub mod echo;
pub mod estimator;
pub mod fallback;
pub mod prague;
pub mod reno;

pub use echo::{EchoState, EcnEchoStateMachine};
pub use estimator::{CongestionEstimator, EstimateSample, DEFAULT_GAIN, DEFAULT_INITIAL_ALPHA};
pub use fallback::{FallbackDetector, FallbackTransition, CLASSIC_FALLBACK_THRESHOLD};
pub use prague::Prague;
pub use reno::Reno;

use crate::config::PragueConfig;
use crate::error::{PragueError, Result};
use crate::socket::{CaEvent, CongestionState, ControlPacket, SocketState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What one acknowledgment cycle reports to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckSample {
    pub segments_acked: u32,
    /// RTT measured by this ACK, zero when none was taken
    pub rtt: Duration,
    /// CE byte count taken from the ACE mailbox for this cycle
    pub ce_bytes: u32,
    pub bytes_acked_sacked: u32,
}

/// Congestion control algorithm trait
pub trait CongestionOps: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Called once when the controller is attached to a connection
    fn init(&mut self, _tcb: &mut SocketState) {}

    /// Slow start threshold to use on entering CWR
    fn ss_thresh(&self, tcb: &SocketState, bytes_in_flight: u32) -> u32;

    /// Called for every acknowledgment cycle
    fn on_ack(&mut self, tcb: &mut SocketState, sample: &AckSample);

    /// Called on a discrete congestion event; may ask for a control packet
    fn cwnd_event(&mut self, tcb: &mut SocketState, event: CaEvent) -> Option<ControlPacket>;

    /// Get current state for debugging
    fn debug_state(&self, tcb: &SocketState) -> CongestionDebugState {
        CongestionDebugState::from_socket(self.name(), tcb)
    }
}

/// Debug state for congestion control
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CongestionDebugState {
    pub algorithm: &'static str,
    pub congestion_window: u32,
    pub ssthresh: u32,
    pub state: CongestionState,
    pub alpha: Option<f64>,
    pub in_fallback: bool,
}

impl CongestionDebugState {
    pub fn from_socket(algorithm: &'static str, tcb: &SocketState) -> Self {
        Self {
            algorithm,
            congestion_window: tcb.cwnd,
            ssthresh: tcb.ssthresh,
            state: tcb.cong_state,
            alpha: None,
            in_fallback: false,
        }
    }
}

/// Available congestion control algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionAlgorithm {
    Reno,
    #[default]
    Prague,
}

impl FromStr for CongestionAlgorithm {
    type Err = PragueError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reno" | "tcplinuxreno" => Ok(Self::Reno),
            "prague" | "tcpprague" => Ok(Self::Prague),
            other => Err(PragueError::Config(format!("Unknown congestion algorithm: {}", other))),
        }
    }
}

impl fmt::Display for CongestionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reno => write!(f, "reno"),
            Self::Prague => write!(f, "prague"),
        }
    }
}

/// The congestion controller owned by one connection
#[derive(Debug, Clone)]
pub enum Controller {
    Reno(Reno),
    Prague(Prague),
}

impl Controller {
    pub fn algorithm(&self) -> CongestionAlgorithm {
        match self {
            Controller::Reno(_) => CongestionAlgorithm::Reno,
            Controller::Prague(_) => CongestionAlgorithm::Prague,
        }
    }

    pub fn as_prague(&self) -> Option<&Prague> {
        match self {
            Controller::Prague(prague) => Some(prague),
            _ => None,
        }
    }

    pub fn as_prague_mut(&mut self) -> Option<&mut Prague> {
        match self {
            Controller::Prague(prague) => Some(prague),
            _ => None,
        }
    }

    /// Independent copy for an alternate path
    pub fn fork(&self) -> Self {
        self.clone()
    }

    fn ops(&self) -> &dyn CongestionOps {
        match self {
            Controller::Reno(reno) => reno as &dyn CongestionOps,
            Controller::Prague(prague) => prague,
        }
    }

    fn ops_mut(&mut self) -> &mut dyn CongestionOps {
        match self {
            Controller::Reno(reno) => reno as &mut dyn CongestionOps,
            Controller::Prague(prague) => prague,
        }
    }
}

impl CongestionOps for Controller {
    fn name(&self) -> &'static str {
        self.ops().name()
    }

    fn init(&mut self, tcb: &mut SocketState) {
        self.ops_mut().init(tcb)
    }

    fn ss_thresh(&self, tcb: &SocketState, bytes_in_flight: u32) -> u32 {
        self.ops().ss_thresh(tcb, bytes_in_flight)
    }

    fn on_ack(&mut self, tcb: &mut SocketState, sample: &AckSample) {
        self.ops_mut().on_ack(tcb, sample)
    }

    fn cwnd_event(&mut self, tcb: &mut SocketState, event: CaEvent) -> Option<ControlPacket> {
        self.ops_mut().cwnd_event(tcb, event)
    }

    fn debug_state(&self, tcb: &SocketState) -> CongestionDebugState {
        self.ops().debug_state(tcb)
    }
}

/// Create a congestion controller
pub fn create_controller(config: &PragueConfig) -> Result<Controller> {
    match config.algorithm {
        CongestionAlgorithm::Reno => Ok(Controller::Reno(Reno::new())),
        CongestionAlgorithm::Prague => {
            let mut prague = Prague::new();
            prague.set_gain(config.gain)?;
            prague.set_initial_alpha(config.initial_alpha)?;
            prague.set_use_ect0(config.use_ect0);
            Ok(Controller::Prague(prague))
        }
    }
}
