//! Configuration for the congestion controller
//!
//! Values come from defaults, an optional file (any format the `config` crate
//! recognizes by extension) and `PRAGUE_*` environment variables, in that
//! order of precedence from lowest to highest.

use crate::congestion::{CongestionAlgorithm, DEFAULT_GAIN, DEFAULT_INITIAL_ALPHA};
use crate::error::{PragueError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `PRAGUE_GAIN=0.125`
pub const ENV_PREFIX: &str = "PRAGUE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PragueConfig {
    /// Algorithm to attach to new connections
    pub algorithm: CongestionAlgorithm,
    /// EWMA gain for alpha
    pub gain: f64,
    /// Alpha before the first ACK
    pub initial_alpha: f64,
    /// Mark with ECT(0) instead of ECT(1)
    pub use_ect0: bool,
    /// Sender maximum segment size in bytes
    pub segment_size: u32,
    /// Initial congestion window in segments
    pub initial_cwnd_segments: u32,
}

impl Default for PragueConfig {
    fn default() -> Self {
        Self {
            algorithm: CongestionAlgorithm::Prague,
            gain: DEFAULT_GAIN,
            initial_alpha: DEFAULT_INITIAL_ALPHA,
            use_ect0: false,
            segment_size: 1448,
            initial_cwnd_segments: 10,
        }
    }
}

impl PragueConfig {
    /// Load configuration from file, with environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| PragueError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables alone
    pub fn load_from_env() -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file as JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| PragueError::Config(format!("Failed to serialize to JSON: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| PragueError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gain) {
            return Err(PragueError::Config(format!("gain must be within [0, 1], got {}", self.gain)));
        }

        if !(0.0..=1.0).contains(&self.initial_alpha) {
            return Err(PragueError::Config(format!(
                "initial_alpha must be within [0, 1], got {}", self.initial_alpha)));
        }

        if self.segment_size == 0 {
            return Err(PragueError::Config("segment_size must be greater than 0".to_string()));
        }

        if self.initial_cwnd_segments == 0 {
            return Err(PragueError::Config("initial_cwnd_segments must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Initial congestion window in bytes
    pub fn initial_cwnd(&self) -> u32 {
        self.segment_size.saturating_mul(self.initial_cwnd_segments)
    }
}

/// Configuration builder for easier setup
pub struct ConfigBuilder {
    config: PragueConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PragueConfig::default(),
        }
    }

    pub fn algorithm(mut self, algorithm: CongestionAlgorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn gain(mut self, gain: f64) -> Self {
        self.config.gain = gain;
        self
    }

    pub fn initial_alpha(mut self, alpha: f64) -> Self {
        self.config.initial_alpha = alpha;
        self
    }

    pub fn use_ect0(mut self, use_ect0: bool) -> Self {
        self.config.use_ect0 = use_ect0;
        self
    }

    pub fn segment_size(mut self, bytes: u32) -> Self {
        self.config.segment_size = bytes;
        self
    }

    pub fn initial_cwnd_segments(mut self, segments: u32) -> Self {
        self.config.initial_cwnd_segments = segments;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PragueConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
