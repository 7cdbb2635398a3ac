//! Error types for tracto-core
//!
//! Only construction-time problems are errors. Missing field data and
//! low-probability candidates inside a step are expressed as NaN or as a
//! rejected step, never as a `TrackError`.

use thiserror::Error;

/// Result type alias for fallible tracto-core operations
pub type Result<T> = std::result::Result<T, TrackError>;

/// Main error type
#[derive(Error, Debug)]
pub enum TrackError {
    /// Invalid run configuration (fatal at construction)
    #[error("Invalid configuration: {field}: {reason}")]
    Config {
        field: &'static str,
        reason: String,
    },

    /// Image loading or shape problems
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration file could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        TrackError::Config {
            field,
            reason: reason.into(),
        }
    }
}

impl From<String> for TrackError {
    fn from(msg: String) -> Self {
        TrackError::Image(msg)
    }
}
