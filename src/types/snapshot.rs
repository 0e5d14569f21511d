//! Read-only views handed to the presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LockVariant, Meters, Phase, Point, TrackerStatus, TrackingSample};

/// Lock minigame state as drawn on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockView {
    pub variant: LockVariant,
    pub active: bool,
    pub stage: u8,
    pub stage_count: u8,
    /// Cursor position (percent) or needle angle (degrees)
    pub position: f64,
    pub zone_start: f64,
    pub zone_width: f64,
}

/// Firewall band rectangle in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirewallView {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub cooling_down: bool,
}

/// Block-transfer task state as drawn on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferView {
    pub active: bool,
    pub source: Point,
    pub target: Point,
    pub block: Point,
    pub holding: bool,
    pub completed: u32,
    pub total: u32,
    pub firewall: Option<FirewallView>,
}

/// Everything the presentation layer may read about a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub taken_at: DateTime<Utc>,
    pub clock_ms: f64,
    pub phase: Phase,
    pub retry: bool,
    pub run_ended: bool,
    pub meters: Meters,
    pub stage: u8,
    pub transfer_count: u32,
    pub firewall_progress: f64,
    pub presence_remaining_ms: Option<f64>,
    pub glitching: bool,
    pub gaze: TrackingSample,
    pub hand: TrackingSample,
    pub gaze_status: TrackerStatus,
    pub hand_status: TrackerStatus,
    pub lock: LockView,
    pub transfer: TransferView,
    pub final_message: Option<String>,
}

impl SessionSnapshot {
    /// One-line summary for terminals
    pub fn to_parseable_string(&self) -> String {
        format!(
            "t={:.1}s | phase={} | signal={:.1} | stability={:.2} | interference={:.2} | stage={} | transfers={} | firewall={:.0}%{}",
            self.clock_ms / 1000.0,
            self.phase,
            self.meters.signal,
            self.meters.stability,
            self.meters.interference,
            self.stage,
            self.transfer_count,
            self.firewall_progress,
            match self.presence_remaining_ms {
                Some(ms) => format!(" | presence={:.1}s", ms / 1000.0),
                None => String::new(),
            }
        )
    }
}
