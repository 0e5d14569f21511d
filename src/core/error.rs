//! Error types
//!
//! Gameplay outcomes (misses, presence expiry, firewall hits) are events, not
//! errors. These cover what can genuinely go wrong around the game.

use thiserror::Error;
use crate::types::Phase;

/// Estimator initialization and detection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error("vision module failed to load: {0}")]
    ModuleLoad(String),

    #[error("inference runtime failed to load: {0}")]
    RuntimeLoad(String),

    #[error("landmark model failed to load: {0}")]
    ModelLoad(String),

    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("estimator not ready")]
    NotReady,
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

/// Operations the current run cannot accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("run has not ended (phase {0})")]
    RunNotEnded(Phase),

    #[error("final message already submitted")]
    FinalMessageTaken,

    #[error("final message is empty")]
    EmptyMessage,
}
