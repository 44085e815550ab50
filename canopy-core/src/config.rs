//! Runtime Configuration
//!
//! Limits that guard the scheduler against runaway re-evaluation. All fields
//! have defaults, so an empty JSON object is a valid configuration.

use serde::Deserialize;

use crate::error::{CoreError, Result};

fn default_max_reentrant_passes() -> usize {
    25
}

fn default_max_flush_passes() -> usize {
    50
}

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// How many times one instance may re-dirty itself during its own
    /// evaluation within a single flush before the flush is aborted.
    #[serde(default = "default_max_reentrant_passes")]
    pub max_reentrant_passes: usize,

    /// Upper bound on passes in one flush, across all instances.
    #[serde(default = "default_max_flush_passes")]
    pub max_flush_passes: usize,

    /// Emit a `trace!` event for every evaluation.
    #[serde(default)]
    pub trace_evaluations: bool,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(CoreError::Config)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reentrant_passes: default_max_reentrant_passes(),
            max_flush_passes: default_max_flush_passes(),
            trace_evaluations: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.max_reentrant_passes, 25);
        assert_eq!(config.max_flush_passes, 50);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = RuntimeConfig::from_json(r#"{"max_reentrant_passes": 3}"#).unwrap();
        assert_eq!(config.max_reentrant_passes, 3);
        assert_eq!(config.max_flush_passes, 50);
        assert!(!config.trace_evaluations);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = RuntimeConfig::from_json(r#"{"max_flush_passes": "many"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
