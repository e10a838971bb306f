//! Classic fallback detection
//!
//! When the smoothed RTT climbs more than [`CLASSIC_FALLBACK_THRESHOLD`] above
//! the lowest RTT ever seen, a classic (non-L4S) bottleneck queue is assumed
//! and CE marks are answered with a Reno-style halving.

use std::time::Duration;
use tracing::info;

/// Queueing delay above the base RTT that switches to classic behaviour
pub const CLASSIC_FALLBACK_THRESHOLD: Duration = Duration::from_millis(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTransition {
    Entered,
    Exited,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackDetector {
    base_rtt: Option<Duration>,
    active: bool,
}

impl FallbackDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest RTT sample seen on this connection
    pub fn base_rtt(&self) -> Option<Duration> {
        self.base_rtt
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one RTT sample together with the connection's current smoothed RTT.
    ///
    /// Zero samples carry no timing information and are ignored.
    pub fn on_rtt_sample(&mut self, rtt: Duration, srtt: Duration) -> Option<FallbackTransition> {
        if rtt.is_zero() {
            return None;
        }

        let base = match self.base_rtt {
            Some(base) if base <= rtt => base,
            _ => {
                self.base_rtt = Some(rtt);
                rtt
            }
        };

        let inflated = srtt > base + CLASSIC_FALLBACK_THRESHOLD;
        if inflated == self.active {
            return None;
        }
        self.active = inflated;

        if inflated {
            info!("Entering classic fallback: base_rtt={:?} srtt={:?}", base, srtt);
            Some(FallbackTransition::Entered)
        } else {
            info!("Exiting classic fallback: base_rtt={:?} srtt={:?}", base, srtt);
            Some(FallbackTransition::Exited)
        }
    }
}
