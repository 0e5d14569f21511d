//! Escape core: tracking, meters and phase orchestration for the escape-the-machine run
//!
//! Tracking estimators feed a meter engine and a presence monitor; the phase
//! machine advances through the minigames. Everything is driven by explicit
//! frame ticks so a fake clock can drive a whole run.

pub mod core;
pub mod types;

// =============================================================================
// METER BOUNDS
// =============================================================================

/// Signal ceiling (signal lives in [0, 100])
pub const SIGNAL_MAX: f64 = 100.0;

/// Signal at or above this value completes calibration
pub const SIGNAL_LOCK_THRESHOLD: f64 = 99.0;

/// Gaze duration cap (milliseconds)
pub const GAZE_DURATION_CAP_MS: f64 = 20_000.0;

// =============================================================================
// METER RATES - per second of frame time
// =============================================================================

/// Signal growth while the face is centered
pub const SIGNAL_GAIN_PER_SEC: f64 = 10.0;

/// Signal decay while the face is off-center
pub const SIGNAL_DECAY_PER_SEC: f64 = 6.0;

/// Extra signal decay while no face is detected (stacks with the off-center decay)
pub const SIGNAL_ABSENT_DECAY_PER_SEC: f64 = 12.0;

/// Stability growth while the face is centered
pub const STABILITY_GAIN_PER_SEC: f64 = 0.12;

/// Stability decay while the face is off-center
pub const STABILITY_DECAY_PER_SEC: f64 = 0.2;

/// Extra stability decay while no face is detected
pub const STABILITY_ABSENT_DECAY_PER_SEC: f64 = 0.3;

/// Signal gain multiplier on a retried run
pub const RETRY_TRUST_MULTIPLIER: f64 = 0.8;

// =============================================================================
// SHOCKS
// =============================================================================

/// Fraction of the current signal kept after a shock
pub const SHOCK_SIGNAL_RETAIN: f64 = 0.7;

/// Flat stability penalty on a shock
pub const SHOCK_STABILITY_PENALTY: f64 = 0.2;

/// Interference bump on a shock
pub const SHOCK_INTERFERENCE_BUMP: f64 = 0.3;

/// Length of the glitch pulse that accompanies a shock (milliseconds)
pub const GLITCH_PULSE_MS: f64 = 350.0;

// =============================================================================
// GAZE
// =============================================================================

/// Horizontal tolerance around frame center for "looking"
pub const GAZE_TOLERANCE_X: f64 = 0.12;

/// Vertical tolerance around frame center for "looking"
pub const GAZE_TOLERANCE_Y: f64 = 0.18;

/// Minimum centroid movement before a new point is published
pub const POINT_PUBLISH_EPSILON: f64 = 0.002;

/// Smoothing factor for the centroid moving average
pub const SMOOTHING_ALPHA: f64 = 0.5;

// =============================================================================
// PRESENCE
// =============================================================================

/// Face may be absent this long before the run fails (milliseconds)
pub const PRESENCE_GRACE_MS: f64 = 3000.0;

/// Cadence of the remaining-time report during a grace window (milliseconds)
pub const PRESENCE_REPORT_INTERVAL_MS: f64 = 100.0;

// =============================================================================
// LOCK MINIGAMES - stage 1..3
// =============================================================================

/// Linear cursor speed per stage (track percent per second)
pub const LINEAR_STAGE_SPEEDS: [f64; 3] = [45.0, 70.0, 100.0];

/// Linear zone width per stage (track percent)
pub const LINEAR_STAGE_WIDTHS: [f64; 3] = [22.0, 15.0, 9.0];

/// Radial needle speed per stage (degrees per second)
pub const RADIAL_STAGE_SPEEDS: [f64; 3] = [120.0, 180.0, 260.0];

/// Radial arc size per stage (degrees)
pub const RADIAL_STAGE_ARCS: [f64; 3] = [60.0, 40.0, 25.0];

// =============================================================================
// BLOCK TRANSFER
// =============================================================================

/// Blocks the transfer task needs before it reports completion
pub const TRANSFER_TOTAL: u32 = 4;

/// Transfers that advance WORK to BREAKING
pub const WORK_ADVANCE_TRANSFERS: u32 = 3;

/// Completed transfers before the firewall starts patrolling
pub const FIREWALL_MIN_COMPLETED: u32 = 2;

/// Firewall cooldown after a hit (milliseconds)
pub const FIREWALL_COOLDOWN_MS: f64 = 900.0;

/// Consecutive untracked frames tolerated during a carry
pub const HAND_LOSS_GRACE_FRAMES: u32 = 10;

/// Hand distance to the source that picks a block up
pub const GRAB_RADIUS: f64 = 0.1;

/// Block distance to the target that completes a transfer
pub const DROP_RADIUS: f64 = 0.12;

// =============================================================================
// KEY MASH
// =============================================================================

/// Firewall progress added per qualifying key press
pub const MASH_INCREMENT: f64 = 10.0;

/// Firewall progress lost per second
pub const MASH_DECAY_PER_SEC: f64 = 5.0;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
