//! Decoder and parser limits.
//!
//! Every length read from untrusted input is checked against these bounds
//! before anything is allocated. The defaults match the reference wire
//! layout; a deployment may tighten them through a TOML file:
//!
//! ```toml
//! [limits]
//! max_payload_bytes = 65536
//! max_depth = 64
//! ```

use crate::error::{IntenseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1_048_576;
pub const DEFAULT_MAX_DIMENSION_BYTES: usize = 1_024;
pub const DEFAULT_MAX_COMPOUND_LEN: usize = 1_024;
pub const DEFAULT_MAX_DEPTH: usize = 1_024;

/// Bounds applied when decoding binary input or parsing canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Longest String, Binary, or Bound payload, in bytes.
    pub max_payload_bytes: usize,
    /// Longest string dimension, in bytes.
    pub max_dimension_bytes: usize,
    /// Most elements in a compound dimension.
    pub max_compound_len: usize,
    /// Deepest context nesting accepted from text or the wire.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_dimension_bytes: DEFAULT_MAX_DIMENSION_BYTES,
            max_compound_len: DEFAULT_MAX_COMPOUND_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Kernel configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: Limits,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| IntenseError::Config {
            reason: e.to_string(),
        })
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using default limits");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| IntenseError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            IntenseError::Config { reason } => IntenseError::Config {
                reason: format!("failed to parse {}: {reason}", path.display()),
            },
            other => other,
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IntenseError::Config {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_maxima() {
        let limits = Limits::default();
        assert_eq!(limits.max_payload_bytes, 1_048_576);
        assert_eq!(limits.max_dimension_bytes, 1_024);
        assert_eq!(limits.max_compound_len, 1_024);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str("[limits]\nmax_depth = 8\n").unwrap();
        assert_eq!(config.limits.max_depth, 8);
        assert_eq!(config.limits.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = Config::from_toml_str("[limits\n").unwrap_err();
        assert!(matches!(err, IntenseError::Config { .. }));
    }

    #[test]
    fn missing_file_is_default() {
        let config = Config::load("/nonexistent/intense.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn toml_roundtrip() {
        let config = Config {
            limits: Limits {
                max_depth: 3,
                ..Limits::default()
            },
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
