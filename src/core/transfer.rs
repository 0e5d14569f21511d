//! Block-transfer task
//!
//! The hand centroid picks a block up at the source, carries it, and drops it
//! on a target that slides up and down its lane. From the configured
//! completion count on, a firewall band patrols the carry path: touching it
//! while carrying sends the block back to the source and starts a cooldown.
//! Losing the hand for too many frames mid-carry does the same, without
//! the cooldown.

use std::f64::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::types::{FirewallLevel, FirewallView, Point, TrackingSample, TransferConfig, TransferView};

/// Vertical travel limits of the target lane
const TARGET_LANE: (f64, f64) = (0.15, 0.85);

/// Something that happened during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Grabbed,
    Delivered { count: u32 },
    /// Fired once, when `count` reaches the configured total
    TaskComplete { count: u32 },
    FirewallHit { count: u32 },
    CarryCancelled,
}

/// Grab, carry and drop blocks past the firewall
#[derive(Debug, Clone)]
pub struct TransferTask {
    /// Geometry and pacing
    config: TransferConfig,
    /// Ticks do nothing while false
    active: bool,
    /// A block is in the hand
    holding: bool,
    /// Successful deliveries since activation
    completed: u32,
    /// `TaskComplete` already reported
    complete_fired: bool,
    /// Block position; the last carry point while holding
    block: Point,
    /// Target height in its lane
    target_y: f64,
    /// +1 moving down, -1 moving up
    target_dir: f64,
    /// Drives the firewall's sinusoid
    elapsed_ms: f64,
    /// Firewall is harmless until this reaches zero
    cooldown_ms: f64,
    /// Consecutive frames without a hand during a carry
    untracked_frames: u32,
}

impl TransferTask {
    pub fn new(config: TransferConfig) -> Self {
        let block = config.source;
        Self {
            config,
            active: false,
            holding: false,
            completed: 0,
            complete_fired: false,
            block,
            target_y: 0.5,
            target_dir: 1.0,
            elapsed_ms: 0.0,
            cooldown_ms: 0.0,
            untracked_frames: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn total(&self) -> u32 {
        self.config.total
    }

    pub fn source(&self) -> Point {
        self.config.source
    }

    pub fn target(&self) -> Point {
        Point::new(self.config.target_x, self.target_y)
    }

    pub fn block(&self) -> Point {
        self.block
    }

    /// Clear progress and start with the target at a random height
    pub fn activate(&mut self, rng: &mut impl Rng) {
        self.reset();
        self.target_y = rng.gen_range(TARGET_LANE.0..=TARGET_LANE.1);
        self.target_dir = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        self.active = true;
    }

    /// Clear progress, inactive
    pub fn reset(&mut self) {
        self.active = false;
        self.holding = false;
        self.completed = 0;
        self.complete_fired = false;
        self.block = self.config.source;
        self.target_y = 0.5;
        self.target_dir = 1.0;
        self.elapsed_ms = 0.0;
        self.cooldown_ms = 0.0;
        self.untracked_frames = 0;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.holding = false;
    }

    fn target_speed(&self) -> f64 {
        let speeds = &self.config.target_speeds;
        let idx = (self.completed as usize).min(speeds.len().saturating_sub(1));
        speeds.get(idx).copied().unwrap_or(0.0)
    }

    fn firewall_level(&self) -> Option<FirewallLevel> {
        let min = self.config.firewall_min_completed;
        if self.completed < min {
            return None;
        }
        let levels = &self.config.firewall_levels;
        let idx = ((self.completed - min) as usize).min(levels.len().saturating_sub(1));
        levels.get(idx).copied()
    }

    /// Current firewall band, if it is patrolling
    pub fn firewall(&self) -> Option<FirewallView> {
        let level = self.firewall_level()?;
        let center = 0.5 + level.amplitude * (TAU * self.elapsed_ms / level.period_ms).sin();
        Some(FirewallView {
            left: self.config.firewall_x.0,
            right: self.config.firewall_x.1,
            top: center - level.height / 2.0,
            bottom: center + level.height / 2.0,
            cooling_down: self.cooldown_ms > 0.0,
        })
    }

    /// Does the carry path from `from` to `to` pass through the live band?
    fn crosses_firewall(&self, from: Point, to: Point) -> bool {
        match self.firewall() {
            Some(band) => !band.cooling_down && segment_hits_band(&band, from, to),
            None => false,
        }
    }

    fn move_target(&mut self, dt: f64) {
        let (low, high) = TARGET_LANE;
        let mut y = self.target_y + self.target_speed() * dt * self.target_dir;
        // A frame can overshoot more than a lane length only with absurd dt
        for _ in 0..4 {
            if y > high {
                y = 2.0 * high - y;
                self.target_dir = -1.0;
            } else if y < low {
                y = 2.0 * low - y;
                self.target_dir = 1.0;
            } else {
                break;
            }
        }
        self.target_y = y.clamp(low, high);
    }

    fn drop_to_source(&mut self) {
        self.holding = false;
        self.block = self.config.source;
    }

    /// Advance one frame with the latest hand sample
    pub fn tick(&mut self, hand: &TrackingSample, dt_ms: f64) -> Vec<TransferOutcome> {
        let mut out = Vec::new();
        if !self.active {
            return out;
        }
        let dt_ms = dt_ms.max(0.0);
        self.elapsed_ms += dt_ms;
        self.cooldown_ms = (self.cooldown_ms - dt_ms).max(0.0);
        self.move_target(dt_ms / 1000.0);

        let hand_point = match (hand.detected, hand.point) {
            (true, Some(p)) => p,
            _ => {
                if self.holding {
                    self.untracked_frames += 1;
                    if self.untracked_frames > self.config.hand_loss_grace_frames {
                        debug!(frames = self.untracked_frames, "hand lost mid-carry");
                        self.drop_to_source();
                        self.untracked_frames = 0;
                        out.push(TransferOutcome::CarryCancelled);
                    }
                }
                return out;
            }
        };
        self.untracked_frames = 0;

        if !self.holding {
            if hand_point.distance(&self.config.source) <= self.config.grab_radius {
                self.holding = true;
                self.block = hand_point;
                out.push(TransferOutcome::Grabbed);
            }
            return out;
        }

        let from = std::mem::replace(&mut self.block, hand_point);
        if self.crosses_firewall(from, hand_point) {
            self.drop_to_source();
            self.cooldown_ms = self.config.firewall_cooldown_ms;
            out.push(TransferOutcome::FirewallHit { count: self.completed });
            return out;
        }

        if hand_point.distance(&self.target()) <= self.config.drop_radius {
            self.drop_to_source();
            self.completed += 1;
            out.push(TransferOutcome::Delivered { count: self.completed });
            if self.completed >= self.config.total && !self.complete_fired {
                self.complete_fired = true;
                self.active = false;
                out.push(TransferOutcome::TaskComplete { count: self.completed });
            }
        }
        out
    }

    pub fn view(&self) -> TransferView {
        TransferView {
            active: self.active,
            source: self.config.source,
            target: self.target(),
            block: self.block,
            holding: self.holding,
            completed: self.completed,
            total: self.config.total,
            firewall: self.firewall(),
        }
    }
}

/// Segment against rectangle (Liang-Barsky clip); edges count as contact
fn segment_hits_band(band: &FirewallView, a: Point, b: Point) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut enter = 0.0_f64;
    let mut exit = 1.0_f64;
    for (p, q) in [
        (-dx, a.x - band.left),
        (dx, band.right - a.x),
        (-dy, a.y - band.top),
        (dy, band.bottom - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            enter = enter.max(r);
        } else {
            exit = exit.min(r);
        }
        if enter > exit {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn task() -> (TransferTask, StdRng) {
        let mut rng = StdRng::seed_from_u64(5);
        let mut task = TransferTask::new(TransferConfig::default());
        task.activate(&mut rng);
        (task, rng)
    }

    fn at(p: Point) -> TrackingSample {
        TrackingSample::hand(p)
    }

    /// Grab at the source, then carry above or below the band onto the target
    fn deliver(task: &mut TransferTask) -> Vec<TransferOutcome> {
        let mut all = task.tick(&at(task.source()), 16.0);
        let lane_y = match task.firewall() {
            Some(band) if band.top > 1.0 - band.bottom => band.top / 2.0,
            Some(band) => (band.bottom + 1.0) / 2.0,
            None => task.source().y,
        };
        let target = task.target();
        for p in [Point::new(task.source().x, lane_y), Point::new(target.x, lane_y), target] {
            all.extend(task.tick(&at(p), 0.0));
        }
        all
    }

    fn band_center(task: &TransferTask) -> f64 {
        let band = task.firewall().unwrap();
        (band.top + band.bottom) / 2.0
    }

    #[test]
    fn test_grab_carry_drop() {
        let (mut task, _) = task();
        assert_eq!(task.tick(&at(Point::new(0.5, 0.1)), 16.0), vec![]);
        assert_eq!(task.tick(&at(task.source()), 16.0), vec![TransferOutcome::Grabbed]);
        assert!(task.is_holding());

        let mid = Point::new(0.3, 0.5);
        task.tick(&at(mid), 16.0);
        assert_eq!(task.block(), mid);

        let target = task.target();
        assert_eq!(task.tick(&at(target), 0.0), vec![TransferOutcome::Delivered { count: 1 }]);
        assert!(!task.is_holding());
        assert_eq!(task.block(), task.source());
    }

    #[test]
    fn test_completion_fires_once_at_total() {
        let (mut task, _) = task();
        let mut completions = 0;
        for _ in 0..4 {
            for outcome in deliver(&mut task) {
                if let TransferOutcome::TaskComplete { count } = outcome {
                    assert_eq!(count, 4);
                    completions += 1;
                }
            }
        }
        assert_eq!(task.completed(), 4);
        assert_eq!(completions, 1);
        assert!(!task.is_active());
        assert!(deliver(&mut task).is_empty());
    }

    #[test]
    fn test_firewall_only_after_two_deliveries() {
        let (mut task, _) = task();
        assert!(task.firewall().is_none());
        deliver(&mut task);
        assert!(task.firewall().is_none());
        deliver(&mut task);
        assert!(task.firewall().is_some());
    }

    #[test]
    fn test_firewall_hit_returns_block_and_cools_down() {
        let (mut task, _) = task();
        deliver(&mut task);
        deliver(&mut task);

        task.tick(&at(task.source()), 0.0);
        assert!(task.is_holding());
        let band = task.firewall().unwrap();
        let inside = Point::new((band.left + band.right) / 2.0, (band.top + band.bottom) / 2.0);

        assert_eq!(task.tick(&at(inside), 0.0), vec![TransferOutcome::FirewallHit { count: 2 }]);
        assert!(!task.is_holding());
        assert_eq!(task.block(), task.source());
        assert_eq!(task.completed(), 2);

        // Cooldown: touching the band right after a hit does nothing
        task.tick(&at(task.source()), 0.0);
        let band = task.firewall().unwrap();
        assert!(band.cooling_down);
        let inside = Point::new((band.left + band.right) / 2.0, (band.top + band.bottom) / 2.0);
        assert_eq!(task.tick(&at(inside), 0.0), vec![]);
        assert!(task.is_holding());
    }

    #[test]
    fn test_carry_jumping_over_band_between_frames_is_a_hit() {
        let (mut task, _) = task();
        deliver(&mut task);
        deliver(&mut task);
        task.tick(&at(task.source()), 0.0);

        let band = task.firewall().unwrap();
        let y = band_center(&task);
        task.tick(&at(Point::new(band.left - 0.05, y)), 0.0);
        assert!(task.is_holding());
        assert_eq!(
            task.tick(&at(Point::new(band.right + 0.05, y)), 0.0),
            vec![TransferOutcome::FirewallHit { count: 2 }]
        );
        assert!(!task.is_holding());
        assert_eq!(task.completed(), 2);
    }

    #[test]
    fn test_carry_passing_beside_band_is_clean() {
        let (mut task, _) = task();
        deliver(&mut task);
        deliver(&mut task);
        task.tick(&at(task.source()), 0.0);

        let band = task.firewall().unwrap();
        let y = if band.top > 0.05 { band.top - 0.02 } else { band.bottom + 0.02 };
        task.tick(&at(Point::new(band.left - 0.05, y)), 0.0);
        assert_eq!(task.tick(&at(Point::new(band.right + 0.05, y)), 0.0), vec![]);
        assert!(task.is_holding());
    }

    #[test]
    fn test_segment_clip() {
        let band = FirewallView { left: 0.4, right: 0.6, top: 0.43, bottom: 0.63, cooling_down: false };
        assert!(segment_hits_band(&band, Point::new(0.35, 0.53), Point::new(0.65, 0.53)));
        assert!(segment_hits_band(&band, Point::new(0.3, 0.3), Point::new(0.7, 0.8)));
        assert!(segment_hits_band(&band, Point::new(0.5, 0.5), Point::new(0.5, 0.5)));
        assert!(!segment_hits_band(&band, Point::new(0.35, 0.3), Point::new(0.65, 0.3)));
        assert!(!segment_hits_band(&band, Point::new(0.3, 0.53), Point::new(0.39, 0.53)));
        assert!(!segment_hits_band(&band, Point::new(0.3, 0.3), Point::new(0.7, 0.35)));
    }

    #[test]
    fn test_cooldown_expires_after_900ms() {
        let (mut task, _) = task();
        deliver(&mut task);
        deliver(&mut task);
        task.tick(&at(task.source()), 0.0);
        let band = task.firewall().unwrap();
        task.tick(&at(Point::new(0.5, (band.top + band.bottom) / 2.0)), 0.0);
        assert!(task.firewall().unwrap().cooling_down);
        task.tick(&TrackingSample::absent(), 899.0);
        assert!(task.firewall().unwrap().cooling_down);
        task.tick(&TrackingSample::absent(), 1.0);
        assert!(!task.firewall().unwrap().cooling_down);
    }

    #[test]
    fn test_hand_loss_grace_cancels_carry() {
        let (mut task, _) = task();
        task.tick(&at(task.source()), 16.0);
        for _ in 0..10 {
            assert_eq!(task.tick(&TrackingSample::absent(), 16.0), vec![]);
            assert!(task.is_holding());
        }
        assert_eq!(task.tick(&TrackingSample::absent(), 16.0), vec![TransferOutcome::CarryCancelled]);
        assert!(!task.is_holding());
        assert_eq!(task.block(), task.source());
    }

    #[test]
    fn test_brief_hand_loss_keeps_carry() {
        let (mut task, _) = task();
        task.tick(&at(task.source()), 16.0);
        for _ in 0..5 {
            task.tick(&TrackingSample::absent(), 16.0);
        }
        task.tick(&at(Point::new(0.3, 0.5)), 16.0);
        for _ in 0..5 {
            task.tick(&TrackingSample::absent(), 16.0);
        }
        assert!(task.is_holding());
    }

    #[test]
    fn test_target_stays_in_lane() {
        let (mut task, _) = task();
        for _ in 0..2000 {
            task.tick(&TrackingSample::absent(), 16.0);
            let y = task.target().y;
            assert!((TARGET_LANE.0..=TARGET_LANE.1).contains(&y));
        }
    }
}
