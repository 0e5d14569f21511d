//! Lock minigames: press while the indicator is inside the zone
//!
//! The linear variant ping-pongs a cursor along a 0-100 track; the radial
//! variant wraps a needle around 360°. A hit advances the stage (the last
//! stage completes the game), a miss drops one stage but never below 1.
//! The zone is re-placed at random whenever the stage changes.

use rand::Rng;
use tracing::debug;

use crate::types::{LockVariant, LockView, StageSpec};

/// Track length for the linear variant (percent)
pub const TRACK_SPAN: f64 = 100.0;

/// Ring size for the radial variant (degrees)
pub const RING_SPAN: f64 = 360.0;

/// Result of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Hit at `stage`, now at `next`
    Hit { stage: u8, next: u8 },
    /// Missed at `stage`, now at `next`
    Miss { stage: u8, next: u8 },
    /// Hit on the last stage; the game deactivates itself
    Completed { stage: u8 },
    /// Game inactive
    Ignored,
}

/// Timing-window lock, linear or radial
#[derive(Debug, Clone)]
pub struct LockGame {
    /// Track shape: ping-pong along 0..100 or wrap around 0..360
    variant: LockVariant,
    /// Speed and zone width per stage, easiest first
    stages: Vec<StageSpec>,
    /// Current stage, 1-based
    stage: u8,
    /// Indicator position on the track (percent or degrees)
    position: f64,
    /// +1 or -1; only the linear track ever flips it
    direction: f64,
    /// Start of the hit zone, placed at random on each stage entry
    zone_start: f64,
    /// Attempts are ignored while false
    active: bool,
}

impl LockGame {
    /// `stages` must be non-empty (config validation guarantees it)
    pub fn new(variant: LockVariant, stages: Vec<StageSpec>) -> Self {
        Self {
            variant,
            stages,
            stage: 1,
            position: 0.0,
            direction: 1.0,
            zone_start: 0.0,
            active: false,
        }
    }

    pub fn variant(&self) -> LockVariant {
        self.variant
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn stage_count(&self) -> u8 {
        self.stages.len() as u8
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Indicator position: percent on the track, degrees on the ring
    pub fn position(&self) -> f64 {
        self.position
    }

    fn spec(&self) -> StageSpec {
        let idx = (self.stage as usize).saturating_sub(1).min(self.stages.len().saturating_sub(1));
        self.stages[idx]
    }

    fn span(&self) -> f64 {
        match self.variant {
            LockVariant::Linear => TRACK_SPAN,
            LockVariant::Radial => RING_SPAN,
        }
    }

    /// Start from stage 1 with a fresh zone
    pub fn activate(&mut self, rng: &mut impl Rng) {
        self.stage = 1;
        self.position = 0.0;
        self.direction = 1.0;
        self.place_zone(rng);
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Back to stage 1, inactive
    pub fn reset(&mut self) {
        self.stage = 1;
        self.position = 0.0;
        self.direction = 1.0;
        self.active = false;
    }

    fn place_zone(&mut self, rng: &mut impl Rng) {
        let width = self.spec().zone;
        self.zone_start = match self.variant {
            LockVariant::Linear => rng.gen_range(0.0..=(TRACK_SPAN - width).max(0.0)),
            LockVariant::Radial => rng.gen_range(0.0..RING_SPAN),
        };
        debug!(variant = ?self.variant, stage = self.stage, zone_start = self.zone_start, width, "zone placed");
    }

    /// Advance the indicator by one frame
    pub fn tick(&mut self, dt_ms: f64) {
        if !self.active {
            return;
        }
        let travel = self.spec().speed * dt_ms.max(0.0) / 1000.0;
        match self.variant {
            LockVariant::Linear => {
                // Unfold the ping-pong into one lap of twice the span
                let lap = 2.0 * TRACK_SPAN;
                let unfolded = if self.direction > 0.0 { self.position } else { lap - self.position };
                let unfolded = (unfolded + travel).rem_euclid(lap);
                if unfolded <= TRACK_SPAN {
                    self.position = unfolded;
                    self.direction = 1.0;
                } else {
                    self.position = lap - unfolded;
                    self.direction = -1.0;
                }
            }
            LockVariant::Radial => {
                self.position = (self.position + travel).rem_euclid(RING_SPAN);
            }
        }
    }

    /// Is the indicator inside the zone right now?
    pub fn in_zone(&self) -> bool {
        let width = self.spec().zone;
        match self.variant {
            LockVariant::Linear => {
                self.position >= self.zone_start && self.position <= self.zone_start + width
            }
            LockVariant::Radial => (self.position - self.zone_start).rem_euclid(RING_SPAN) <= width,
        }
    }

    /// Sample the indicator against the zone
    pub fn attempt(&mut self, rng: &mut impl Rng) -> LockOutcome {
        if !self.active {
            return LockOutcome::Ignored;
        }
        let stage = self.stage;
        if self.in_zone() {
            if stage >= self.stage_count() {
                self.active = false;
                return LockOutcome::Completed { stage };
            }
            self.stage += 1;
            self.place_zone(rng);
            LockOutcome::Hit { stage, next: self.stage }
        } else {
            if self.stage > 1 {
                self.stage -= 1;
                self.place_zone(rng);
            }
            LockOutcome::Miss { stage, next: self.stage }
        }
    }

    pub fn view(&self) -> LockView {
        LockView {
            variant: self.variant,
            active: self.active,
            stage: self.stage,
            stage_count: self.stage_count(),
            position: self.position,
            zone_start: self.zone_start,
            zone_width: self.spec().zone,
        }
        .clamp_to(self.span())
    }
}

impl LockView {
    fn clamp_to(mut self, span: f64) -> Self {
        self.position = self.position.clamp(0.0, span);
        self
    }
}
