//! EWMA estimate of the fraction of acknowledged bytes that were CE-marked

use serde::Serialize;
use tracing::trace;

/// Default EWMA gain (1/16)
pub const DEFAULT_GAIN: f64 = 0.0625;

/// Alpha a fresh connection starts from
pub const DEFAULT_INITIAL_ALPHA: f64 = 1.0;

/// One estimator update, kept for tracing and inspection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimateSample {
    pub bytes_acked: u32,
    pub bytes_marked: u32,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CongestionEstimator {
    alpha: f64,
    gain: f64,
}

impl Default for CongestionEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_ALPHA, DEFAULT_GAIN)
    }
}

impl CongestionEstimator {
    pub fn new(alpha: f64, gain: f64) -> Self {
        Self { alpha, gain }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub(crate) fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub(crate) fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    /// Share of `bytes_acked` that was marked, 0 when nothing was acked.
    ///
    /// A report claiming more marked bytes than were acked counts as 1.
    pub fn fraction(bytes_marked: u32, bytes_acked: u32) -> f64 {
        if bytes_acked == 0 {
            return 0.0;
        }
        (f64::from(bytes_marked) / f64::from(bytes_acked)).min(1.0)
    }

    /// Fold one ACK cycle into alpha
    pub fn update(&mut self, bytes_marked: u32, bytes_acked: u32) -> EstimateSample {
        let fraction = Self::fraction(bytes_marked, bytes_acked);
        self.alpha = (1.0 - self.gain) * self.alpha + self.gain * fraction;

        trace!(bytes_acked, bytes_marked, alpha = self.alpha, "congestion estimate");

        EstimateSample {
            bytes_acked,
            bytes_marked,
            alpha: self.alpha,
        }
    }
}
