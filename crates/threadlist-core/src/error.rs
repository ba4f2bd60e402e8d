use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for transport-boundary handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineErrorCategory {
    /// Invalid input or configuration issue.
    Config,
    /// Transient network or transport failure.
    Transport,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal engine bug or invariant break.
    Internal,
}

/// Stable error payload crossing the transport/engine boundary.
///
/// The reconciler itself never produces these for stale, duplicate, or
/// unknown-id events; those degrade to "no change" by contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct EngineError {
    /// High-level error category.
    pub category: EngineErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl EngineError {
    /// Construct a new engine error.
    pub fn new(
        category: EngineErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a transport-classified error with a stable code.
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Transport, code, message)
    }

    /// Build a config-classified error with a stable code.
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Config, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_stable_code_and_category() {
        let err = EngineError::transport("fetch_failed", "socket closed");
        assert_eq!(err.code, "fetch_failed");
        assert_eq!(err.category, EngineErrorCategory::Transport);
    }

    #[test]
    fn formats_display_with_category_and_code() {
        let err = EngineError::config("bad_page_size", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Config:bad_page_size: must be at least 1"
        );
    }
}
