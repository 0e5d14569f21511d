//! Tracker lifecycle status

use serde::{Deserialize, Serialize};

/// Which estimator a status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    Gaze,
    Hand,
}

impl std::fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerKind::Gaze => write!(f, "gaze"),
            TrackerKind::Hand => write!(f, "hand"),
        }
    }
}

/// Initialization milestones, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStage {
    ModuleLoad,
    RuntimeLoad,
    ModelLoad,
    CameraPermission,
}

impl InitStage {
    /// Rough completion percentage reported with the milestone
    pub fn progress(&self) -> u8 {
        match self {
            InitStage::ModuleLoad => 10,
            InitStage::RuntimeLoad => 35,
            InitStage::ModelLoad => 60,
            InitStage::CameraPermission => 85,
        }
    }
}

/// Published estimator status. `Ready` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackerStatus {
    Idle,
    Loading { stage: InitStage },
    Ready,
    Error { message: String },
}

impl TrackerStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, TrackerStatus::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerStatus::Ready | TrackerStatus::Error { .. })
    }
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerStatus::Idle => write!(f, "idle"),
            TrackerStatus::Loading { stage } => write!(f, "loading {:?} ({}%)", stage, stage.progress()),
            TrackerStatus::Ready => write!(f, "ready"),
            TrackerStatus::Error { message } => write!(f, "error: {}", message),
        }
    }
}
