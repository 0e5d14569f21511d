//! Tunable game configuration
//!
//! Every field defaults to the constants in the crate root, so a config file
//! only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::ConfigError;
use crate::types::{Key, LockVariant, Point};
use crate::{
    DROP_RADIUS, FIREWALL_COOLDOWN_MS, FIREWALL_MIN_COMPLETED, GAZE_TOLERANCE_X,
    GAZE_TOLERANCE_Y, GLITCH_PULSE_MS, GRAB_RADIUS, HAND_LOSS_GRACE_FRAMES,
    LINEAR_STAGE_SPEEDS, LINEAR_STAGE_WIDTHS, MASH_DECAY_PER_SEC, MASH_INCREMENT,
    POINT_PUBLISH_EPSILON, PRESENCE_GRACE_MS, PRESENCE_REPORT_INTERVAL_MS,
    RADIAL_STAGE_ARCS, RADIAL_STAGE_SPEEDS, RETRY_TRUST_MULTIPLIER, SHOCK_INTERFERENCE_BUMP,
    SHOCK_SIGNAL_RETAIN, SHOCK_STABILITY_PENALTY, SIGNAL_ABSENT_DECAY_PER_SEC,
    SIGNAL_DECAY_PER_SEC, SIGNAL_GAIN_PER_SEC, SIGNAL_LOCK_THRESHOLD, SIGNAL_MAX,
    SMOOTHING_ALPHA, STABILITY_ABSENT_DECAY_PER_SEC, STABILITY_DECAY_PER_SEC,
    STABILITY_GAIN_PER_SEC, TRANSFER_TOTAL, WORK_ADVANCE_TRANSFERS,
};

/// Meter engine rates and shock sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub signal_gain_per_sec: f64,
    pub signal_decay_per_sec: f64,
    pub signal_absent_decay_per_sec: f64,
    pub stability_gain_per_sec: f64,
    pub stability_decay_per_sec: f64,
    pub stability_absent_decay_per_sec: f64,
    pub retry_trust_multiplier: f64,
    pub lock_threshold: f64,
    pub shock_signal_retain: f64,
    pub shock_stability_penalty: f64,
    pub shock_interference_bump: f64,
    pub glitch_pulse_ms: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            signal_gain_per_sec: SIGNAL_GAIN_PER_SEC,
            signal_decay_per_sec: SIGNAL_DECAY_PER_SEC,
            signal_absent_decay_per_sec: SIGNAL_ABSENT_DECAY_PER_SEC,
            stability_gain_per_sec: STABILITY_GAIN_PER_SEC,
            stability_decay_per_sec: STABILITY_DECAY_PER_SEC,
            stability_absent_decay_per_sec: STABILITY_ABSENT_DECAY_PER_SEC,
            retry_trust_multiplier: RETRY_TRUST_MULTIPLIER,
            lock_threshold: SIGNAL_LOCK_THRESHOLD,
            shock_signal_retain: SHOCK_SIGNAL_RETAIN,
            shock_stability_penalty: SHOCK_STABILITY_PENALTY,
            shock_interference_bump: SHOCK_INTERFERENCE_BUMP,
            glitch_pulse_ms: GLITCH_PULSE_MS,
        }
    }
}

/// Estimator geometry and filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub tolerance_x: f64,
    pub tolerance_y: f64,
    pub publish_epsilon: f64,
    pub smoothing_alpha: f64,
    /// Face landmark used as the gaze anchor (nose tip in a face mesh)
    pub anchor_landmark: usize,
    /// Mirror x so the centroid matches a selfie view
    pub mirror: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tolerance_x: GAZE_TOLERANCE_X,
            tolerance_y: GAZE_TOLERANCE_Y,
            publish_epsilon: POINT_PUBLISH_EPSILON,
            smoothing_alpha: SMOOTHING_ALPHA,
            anchor_landmark: 1,
            mirror: true,
        }
    }
}

/// One difficulty tier of a lock minigame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Indicator speed (percent/s on a track, degrees/s on a ring)
    pub speed: f64,
    /// Zone width (percent) or arc size (degrees)
    pub zone: f64,
}

fn stage_table(speeds: [f64; 3], zones: [f64; 3]) -> Vec<StageSpec> {
    speeds
        .iter()
        .zip(zones.iter())
        .map(|(&speed, &zone)| StageSpec { speed, zone })
        .collect()
}

/// Lock minigame tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub variant: LockVariant,
    pub linear: Vec<StageSpec>,
    pub radial: Vec<StageSpec>,
    pub hit_flash_ms: f64,
    pub miss_shake_ms: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            variant: LockVariant::Linear,
            linear: stage_table(LINEAR_STAGE_SPEEDS, LINEAR_STAGE_WIDTHS),
            radial: stage_table(RADIAL_STAGE_SPEEDS, RADIAL_STAGE_ARCS),
            hit_flash_ms: 120.0,
            miss_shake_ms: 320.0,
        }
    }
}

impl LockConfig {
    /// Stage table for the given variant
    pub fn stages(&self, variant: LockVariant) -> &[StageSpec] {
        match variant {
            LockVariant::Linear => &self.linear,
            LockVariant::Radial => &self.radial,
        }
    }
}

/// Firewall band parameters at one completion level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirewallLevel {
    /// Band thickness (normalized)
    pub height: f64,
    /// Full oscillation period (milliseconds)
    pub period_ms: f64,
    /// Vertical swing around the center line (normalized)
    pub amplitude: f64,
}

/// Block-transfer geometry and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Deliveries the task needs before reporting completion
    pub total: u32,
    /// Deliveries that advance WORK to BREAKING
    pub advance_at: u32,
    pub source: Point,
    /// Horizontal position of the moving target lane
    pub target_x: f64,
    /// Target speed along its lane (normalized per second), per completed count
    pub target_speeds: Vec<f64>,
    pub grab_radius: f64,
    pub drop_radius: f64,
    pub firewall_min_completed: u32,
    /// Levels indexed by `completed - firewall_min_completed`, last one repeats
    pub firewall_levels: Vec<FirewallLevel>,
    /// Horizontal extent of the firewall band
    pub firewall_x: (f64, f64),
    pub firewall_cooldown_ms: f64,
    pub hand_loss_grace_frames: u32,
    pub error_shake_ms: f64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            total: TRANSFER_TOTAL,
            advance_at: WORK_ADVANCE_TRANSFERS,
            source: Point::new(0.2, 0.5),
            target_x: 0.8,
            target_speeds: vec![0.12, 0.18, 0.24, 0.3],
            grab_radius: GRAB_RADIUS,
            drop_radius: DROP_RADIUS,
            firewall_min_completed: FIREWALL_MIN_COMPLETED,
            firewall_levels: vec![
                FirewallLevel { height: 0.2, period_ms: 2400.0, amplitude: 0.3 },
                FirewallLevel { height: 0.14, period_ms: 1600.0, amplitude: 0.35 },
            ],
            firewall_x: (0.4, 0.6),
            firewall_cooldown_ms: FIREWALL_COOLDOWN_MS,
            hand_loss_grace_frames: HAND_LOSS_GRACE_FRAMES,
            error_shake_ms: 450.0,
        }
    }
}

/// Key-mash accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MashConfig {
    pub increment: f64,
    pub decay_per_sec: f64,
    pub keys: Vec<Key>,
}

impl Default for MashConfig {
    fn default() -> Self {
        Self {
            increment: MASH_INCREMENT,
            decay_per_sec: MASH_DECAY_PER_SEC,
            keys: vec![Key::Space],
        }
    }
}

/// Presence monitor timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub grace_ms: f64,
    pub report_interval_ms: f64,
    pub warning_text: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            grace_ms: PRESENCE_GRACE_MS,
            report_interval_ms: PRESENCE_REPORT_INTERVAL_MS,
            warning_text: "Where did you go? Come back to the screen.".to_string(),
        }
    }
}

/// Complete tunable configuration of a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub meters: MeterConfig,
    pub tracking: TrackingConfig,
    pub lock: LockConfig,
    pub transfer: TransferConfig,
    pub mash: MashConfig,
    pub presence: PresenceConfig,
    /// Seed for zone placement; `None` draws one from entropy
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values the engines cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.meters;
        for (field, value) in [
            ("meters.signal_gain_per_sec", m.signal_gain_per_sec),
            ("meters.stability_gain_per_sec", m.stability_gain_per_sec),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
        }
        for (field, value) in [
            ("meters.signal_decay_per_sec", m.signal_decay_per_sec),
            ("meters.signal_absent_decay_per_sec", m.signal_absent_decay_per_sec),
            ("meters.stability_decay_per_sec", m.stability_decay_per_sec),
            ("meters.stability_absent_decay_per_sec", m.stability_absent_decay_per_sec),
            ("meters.glitch_pulse_ms", m.glitch_pulse_ms),
        ] {
            if value < 0.0 {
                return Err(ConfigError::invalid(field, "must not be negative"));
            }
        }
        if !(0.0..=1.0).contains(&m.retry_trust_multiplier) || m.retry_trust_multiplier == 0.0 {
            return Err(ConfigError::invalid("meters.retry_trust_multiplier", "must be in (0, 1]"));
        }
        if !(0.0..=SIGNAL_MAX).contains(&m.lock_threshold) {
            return Err(ConfigError::invalid("meters.lock_threshold", "must be within signal bounds"));
        }
        if !(0.0..=1.0).contains(&m.shock_signal_retain) {
            return Err(ConfigError::invalid("meters.shock_signal_retain", "must be in [0, 1]"));
        }

        let t = &self.tracking;
        if t.tolerance_x <= 0.0 || t.tolerance_y <= 0.0 {
            return Err(ConfigError::invalid("tracking.tolerance", "must be positive"));
        }
        if !(0.0..=1.0).contains(&t.smoothing_alpha) || t.smoothing_alpha == 0.0 {
            return Err(ConfigError::invalid("tracking.smoothing_alpha", "must be in (0, 1]"));
        }

        validate_stages("lock.linear", &self.lock.linear, 100.0)?;
        validate_stages("lock.radial", &self.lock.radial, 360.0)?;

        let tr = &self.transfer;
        if tr.total == 0 {
            return Err(ConfigError::invalid("transfer.total", "must be at least 1"));
        }
        if tr.advance_at == 0 {
            return Err(ConfigError::invalid("transfer.advance_at", "must be at least 1"));
        }
        if tr.target_speeds.is_empty() {
            return Err(ConfigError::invalid("transfer.target_speeds", "must not be empty"));
        }
        if tr.firewall_levels.is_empty() {
            return Err(ConfigError::invalid("transfer.firewall_levels", "must not be empty"));
        }
        if tr.firewall_levels.iter().any(|l| l.period_ms <= 0.0 || l.height <= 0.0) {
            return Err(ConfigError::invalid("transfer.firewall_levels", "period and height must be positive"));
        }
        if tr.firewall_x.0 >= tr.firewall_x.1 {
            return Err(ConfigError::invalid("transfer.firewall_x", "left edge must be left of right edge"));
        }
        if tr.advance_at != tr.total {
            warn!(
                advance_at = tr.advance_at,
                total = tr.total,
                "WORK advances at a different count than the transfer task completes"
            );
        }

        if self.mash.increment <= 0.0 {
            return Err(ConfigError::invalid("mash.increment", "must be positive"));
        }
        if self.mash.keys.is_empty() {
            return Err(ConfigError::invalid("mash.keys", "must name at least one key"));
        }

        if self.presence.grace_ms <= 0.0 {
            return Err(ConfigError::invalid("presence.grace_ms", "must be positive"));
        }
        if self.presence.report_interval_ms <= 0.0 {
            return Err(ConfigError::invalid("presence.report_interval_ms", "must be positive"));
        }

        Ok(())
    }
}

fn validate_stages(field: &'static str, stages: &[StageSpec], span: f64) -> Result<(), ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::invalid(field, "needs at least one stage"));
    }
    if stages.len() > u8::MAX as usize {
        return Err(ConfigError::invalid(field, "too many stages"));
    }
    for stage in stages {
        if stage.speed <= 0.0 {
            return Err(ConfigError::invalid(field, "stage speed must be positive"));
        }
        if stage.zone <= 0.0 || stage.zone >= span {
            return Err(ConfigError::invalid(field, format!("zone must be in (0, {})", span)));
        }
    }
    Ok(())
}
