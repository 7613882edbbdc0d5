//! Error types for Intense kernel operations.

use crate::participant::ParticipantError;

/// Errors arising from parsing, decoding, resolution, or invalid structure.
#[derive(Debug, thiserror::Error)]
pub enum IntenseError {
    /// Canonical text could not be recognized.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Binary input was malformed, truncated, or exceeded a limit.
    #[error("deserialize error at offset {offset}: {reason}")]
    Deserialize { offset: usize, reason: String },

    /// A tree-navigation or value operation was applied to incompatible
    /// operands (unrelated nodes, mismatched value kinds, unencodable sizes).
    #[error("structural error: {0}")]
    Structural(String),

    /// No unique best fit exists among the versions of a domain.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// A participant callback failed during propagation.
    #[error(transparent)]
    Participant(#[from] ParticipantError),

    /// Limits configuration could not be read or parsed.
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl IntenseError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn deserialize(offset: usize, reason: impl Into<String>) -> Self {
        Self::Deserialize {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }
}

/// Result alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, IntenseError>;
