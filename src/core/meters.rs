//! Meter engine: integrates gaze samples into bounded meters
//!
//! Only runs during calibration. Centered gaze grows signal and stability;
//! anything else decays them, and a missing face decays them faster still.
//! Interference is recomputed as `1 - stability` on every continuous tick.

use tracing::debug;

use crate::types::{Meters, MeterConfig, ShockCause, TrackingSample};
use crate::SIGNAL_MAX;

/// Result of one continuous tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterTick {
    /// Still calibrating
    Running,
    /// Signal crossed the lock threshold and was pinned at max
    Locked,
    /// Engine is frozen; nothing changed
    Frozen,
}

/// Shock edge between two consecutive gaze samples, if any
pub fn shock_edge(prev: &TrackingSample, next: &TrackingSample) -> Option<ShockCause> {
    if prev.detected && !next.detected {
        Some(ShockCause::FaceLost)
    } else if prev.is_centered() && next.detected && !next.is_centered() {
        Some(ShockCause::GazeLost)
    } else {
        None
    }
}

/// Owns the meters for a run
#[derive(Debug, Clone)]
pub struct MeterEngine {
    config: MeterConfig,
    /// Current readings, always within bounds
    meters: Meters,
    /// Retry run: signal gain takes the trust multiplier
    retry: bool,
    /// Ticks and shocks are ignored once set
    frozen: bool,
}

impl MeterEngine {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            meters: Meters::initial(),
            retry: false,
            frozen: false,
        }
    }

    pub fn meters(&self) -> Meters {
        self.meters
    }

    /// Signal gain multiplier for this run
    pub fn trust(&self) -> f64 {
        if self.retry { self.config.retry_trust_multiplier } else { 1.0 }
    }

    /// Integrate one frame of gaze
    pub fn tick(&mut self, sample: &TrackingSample, dt_ms: f64) -> MeterTick {
        if self.frozen {
            return MeterTick::Frozen;
        }
        let dt_ms = dt_ms.max(0.0);
        let dt = dt_ms / 1000.0;
        let c = &self.config;
        let mut m = self.meters;

        if sample.is_centered() {
            m.gaze_duration_ms += dt_ms;
            m.signal += c.signal_gain_per_sec * self.trust() * dt;
            m.stability += c.stability_gain_per_sec * dt;
        } else {
            m.gaze_duration_ms = 0.0;
            m.signal -= c.signal_decay_per_sec * dt;
            m.stability -= c.stability_decay_per_sec * dt;
            if !sample.detected {
                m.signal -= c.signal_absent_decay_per_sec * dt;
                m.stability -= c.stability_absent_decay_per_sec * dt;
            }
        }

        let mut m = m.clamped();
        m.interference = (1.0 - m.stability).clamp(0.0, 1.0);

        let outcome = if m.signal >= c.lock_threshold {
            m.signal = SIGNAL_MAX;
            MeterTick::Locked
        } else {
            MeterTick::Running
        };
        self.meters = m;
        outcome
    }

    /// One-shot penalty for losing gaze or face. Interference is nudged on its
    /// own here; the next tick restores `1 - stability`.
    pub fn shock(&mut self, cause: ShockCause) -> Option<Meters> {
        if self.frozen {
            return None;
        }
        let c = &self.config;
        let mut m = self.meters;
        m.signal *= c.shock_signal_retain;
        m.stability -= c.shock_stability_penalty;
        m.interference += c.shock_interference_bump;
        self.meters = m.clamped();
        debug!(?cause, signal = self.meters.signal, "meter shock");
        Some(self.meters)
    }

    /// Pin meters at their resting values and stop integrating
    pub fn solve(&mut self) {
        self.meters = Meters::solved();
        self.frozen = true;
    }

    /// Stop integrating but keep the current readings
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Fresh meters for a new run
    pub fn reset(&mut self, retry: bool) {
        self.meters = Meters::initial();
        self.retry = retry;
        self.frozen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn centered() -> TrackingSample {
        TrackingSample::face(Point::CENTER, true)
    }

    fn off_center() -> TrackingSample {
        TrackingSample::face(Point::new(0.9, 0.5), false)
    }

    #[test]
    fn test_centered_gaze_grows_signal_at_gain_rate() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        engine.tick(&centered(), 1000.0);
        let m = engine.meters();
        assert!((m.signal - 10.0).abs() < 1e-9);
        assert!((m.gaze_duration_ms - 1000.0).abs() < 1e-9);
        assert!((m.interference - (1.0 - m.stability)).abs() < 1e-12);
    }

    #[test]
    fn test_retry_trust_attenuates_gain() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        engine.reset(true);
        engine.tick(&centered(), 1000.0);
        assert!((engine.meters().signal - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_off_center_resets_gaze_duration_and_decays() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        engine.tick(&centered(), 2000.0);
        engine.tick(&off_center(), 500.0);
        let m = engine.meters();
        assert_eq!(m.gaze_duration_ms, 0.0);
        assert!((m.signal - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_face_decay_stacks() {
        let config = MeterConfig::default();
        let mut a = MeterEngine::new(config.clone());
        let mut b = MeterEngine::new(config);
        a.tick(&centered(), 5000.0);
        b.tick(&centered(), 5000.0);
        a.tick(&off_center(), 1000.0);
        b.tick(&TrackingSample::absent(), 1000.0);
        assert!(b.meters().signal < a.meters().signal);
        assert!((a.meters().signal - b.meters().signal - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_gaze_duration_capped() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        let mut config = MeterConfig::default();
        config.lock_threshold = 100.0;
        engine.config = config;
        for _ in 0..30 {
            engine.tick(&centered(), 1000.0);
        }
        assert_eq!(engine.meters().gaze_duration_ms, crate::GAZE_DURATION_CAP_MS);
    }

    #[test]
    fn test_lock_threshold_pins_signal() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        assert_eq!(engine.tick(&centered(), 9800.0), MeterTick::Running);
        assert_eq!(engine.tick(&centered(), 100.0), MeterTick::Locked);
        assert_eq!(engine.meters().signal, SIGNAL_MAX);
    }

    #[test]
    fn test_bounds_hold_for_any_dt() {
        let samples = [centered(), off_center(), TrackingSample::absent()];
        let mut engine = MeterEngine::new(MeterConfig::default());
        for (i, dt) in [0.0, 1.0, 16.7, 250.0, 5_000.0, 1e7].iter().cycle().take(60).enumerate() {
            engine.tick(&samples[i % 3], *dt);
            let m = engine.meters();
            assert!(m.in_bounds(), "out of bounds after dt={}: {:?}", dt, m);
            assert!((m.interference - (1.0 - m.stability)).abs() < 1e-12);
            if engine.tick(&samples[i % 3], 0.0) == MeterTick::Locked {
                engine.reset(false);
            }
        }
    }

    #[test]
    fn test_shock_penalizes_and_breaks_complement_until_next_tick() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        engine.tick(&centered(), 5000.0);
        let before = engine.meters();
        let after = engine.shock(ShockCause::GazeLost).unwrap();
        assert!((after.signal - before.signal * 0.7).abs() < 1e-9);
        assert!((after.stability - (before.stability - 0.2).max(0.0)).abs() < 1e-9);
        assert!(after.interference <= 1.0);
        engine.tick(&off_center(), 0.0);
        let m = engine.meters();
        assert!((m.interference - (1.0 - m.stability)).abs() < 1e-12);
    }

    #[test]
    fn test_solved_engine_is_frozen() {
        let mut engine = MeterEngine::new(MeterConfig::default());
        engine.solve();
        assert_eq!(engine.tick(&TrackingSample::absent(), 1000.0), MeterTick::Frozen);
        assert_eq!(engine.shock(ShockCause::FaceLost), None);
        assert_eq!(engine.meters(), Meters::solved());
    }

    #[test]
    fn test_shock_edges() {
        let absent = TrackingSample::absent();
        assert_eq!(shock_edge(&centered(), &absent), Some(ShockCause::FaceLost));
        assert_eq!(shock_edge(&off_center(), &absent), Some(ShockCause::FaceLost));
        assert_eq!(shock_edge(&centered(), &off_center()), Some(ShockCause::GazeLost));
        assert_eq!(shock_edge(&absent, &absent), None);
        assert_eq!(shock_edge(&off_center(), &off_center()), None);
        assert_eq!(shock_edge(&absent, &centered()), None);
    }
}
