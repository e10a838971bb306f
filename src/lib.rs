//! Prague (L4S) sender-side congestion control with Accurate ECN feedback
//!
//! The receiver reports the exact number of CE-marked bytes through the
//! [`ace`] option; the [`congestion::Prague`] controller turns those counts into
//! an EWMA marking fraction and scales its window reductions by it, falling
//! back to classic halving when the RTT shows a non-L4S queue.

// Wire format for the CE byte count
pub mod ace;

// Congestion control strategies and the registry that selects them
pub mod congestion;

pub mod config;
pub mod ecn;
pub mod error;
pub mod session;
pub mod socket;

// Re-export main types
pub use ace::{AceOption, CeByteMailbox};
pub use congestion::{CongestionAlgorithm, CongestionOps, Controller, Prague};
pub use error::{PragueError, Result};
pub use session::CongestionSession;

pub mod prelude {
    pub use crate::ace::{find_ace_option, AceOption, CeByteMailbox};
    pub use crate::config::{ConfigBuilder, PragueConfig};
    pub use crate::congestion::{create_controller, AckSample, CongestionAlgorithm, CongestionOps, Controller, Prague, Reno};
    pub use crate::ecn::{EcnCodepoint, EcnState};
    pub use crate::error::{PragueError, Result};
    pub use crate::session::CongestionSession;
    pub use crate::socket::{CaEvent, CongestionState, ControlPacket, SequenceNumber, SocketState};
}
