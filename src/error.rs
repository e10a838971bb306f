//! Error types for the Prague congestion controller

use thiserror::Error;

/// Why an ACE option could not be decoded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionError {
    #[error("unexpected option kind {0}")]
    UnexpectedKind(u8),

    #[error("unexpected option length {0}")]
    UnexpectedLength(u8),

    #[error("option truncated: {len} bytes available")]
    Truncated { len: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PragueError {
    #[error("Malformed ACE option: {0}")]
    MalformedOption(#[from] OptionError),

    #[error("Configuration locked: {0} cannot change once the controller is initialized")]
    ConfigurationLocked(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<::config::ConfigError> for PragueError {
    fn from(err: ::config::ConfigError) -> Self {
        PragueError::Config(err.to_string())
    }
}

impl PragueError {
    /// Check if this error is recoverable
    ///
    /// A malformed option is skipped by the option parser and the connection
    /// carries on. Touching locked configuration is a caller bug.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PragueError::MalformedOption(_) => true,
            PragueError::Config(_) => true,
            PragueError::ConfigurationLocked(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PragueError::ConfigurationLocked(_) => ErrorSeverity::Critical,
            PragueError::Config(_) => ErrorSeverity::Medium,
            PragueError::MalformedOption(_) => ErrorSeverity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

pub type Result<T> = std::result::Result<T, PragueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_configuration_is_fatal() {
        let err = PragueError::ConfigurationLocked("initial_alpha");
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("initial_alpha"));
    }

    #[test]
    fn test_malformed_option_is_recoverable() {
        let err: PragueError = OptionError::UnexpectedLength(8).into();
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.to_string(), "Malformed ACE option: unexpected option length 8");
    }
}
