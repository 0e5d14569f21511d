//! Deterministic player used by `--simulate` and the end-to-end tests
//!
//! Holds a centered gaze, presses when the lock indicator is in its zone,
//! carries blocks around the firewall, mashes through the breach, and ends
//! the cinematic. A failure is retried.

use tracing::debug;

use crate::core::session::Session;
use crate::types::{Input, Phase, Point, TrackingSample};

/// Clearance kept around the firewall band before crossing its lane
const BAND_MARGIN: f64 = 0.12;

/// How far past the band's lane the hand goes before heading to the target
const LANE_CLEARANCE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Autopilot {
    hand: Point,
    /// Hand travel (normalized units per second)
    hand_speed: f64,
    mash_interval_ms: f64,
    since_mash_ms: f64,
    cinematic_ms: f64,
    awakened_ms: f64,
    final_message: Option<String>,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new()
    }
}

impl Autopilot {
    pub fn new() -> Self {
        Self {
            hand: Point::new(0.5, 0.8),
            hand_speed: 6.0,
            mash_interval_ms: 50.0,
            since_mash_ms: 0.0,
            cinematic_ms: 1500.0,
            awakened_ms: 0.0,
            final_message: None,
        }
    }

    /// Leave this message once the run has ended
    pub fn with_final_message(mut self, text: impl Into<String>) -> Self {
        self.final_message = Some(text.into());
        self
    }

    pub fn hand(&self) -> Point {
        self.hand
    }

    /// Feed this frame's samples and inputs, then advance the session
    pub fn step(&mut self, session: &mut Session, dt_ms: f64) {
        let phase = session.phase();
        if phase.is_gaze_gated() {
            session.push_gaze(TrackingSample::face(Point::CENTER, true));
        }

        match phase {
            Phase::Anxious => {
                if session.lock_in_zone() {
                    session.input(Input::SPACE);
                }
            }
            Phase::Work => {
                self.steer(session, dt_ms);
                session.push_hand(TrackingSample::hand(self.hand));
            }
            Phase::Breaking => {
                self.since_mash_ms += dt_ms;
                if self.since_mash_ms >= self.mash_interval_ms {
                    self.since_mash_ms = 0.0;
                    session.input(Input::SPACE);
                }
            }
            Phase::Awakened => {
                self.awakened_ms += dt_ms;
                if self.awakened_ms >= self.cinematic_ms && session.cinematic_ended() {
                    if let Some(text) = self.final_message.take() {
                        if let Err(e) = session.submit_final_message(&text) {
                            debug!(error = %e, "final message refused");
                        }
                    }
                }
            }
            Phase::Failed => {
                session.retry();
            }
            Phase::Trapped => {}
        }
        if phase != Phase::Awakened {
            self.awakened_ms = 0.0;
        }

        session.advance(dt_ms);
    }

    /// Step until the run ends or `limit_ms` of frame time has passed
    pub fn run(&mut self, session: &mut Session, dt_ms: f64, limit_ms: f64) -> bool {
        let start = session.clock_ms();
        while session.clock_ms() - start < limit_ms {
            self.step(session, dt_ms);
            if session.snapshot().run_ended {
                return true;
            }
        }
        false
    }

    fn steer(&mut self, session: &Session, dt_ms: f64) {
        let view = session.snapshot().transfer;
        let lane = (session.config().transfer.firewall_x.0, session.config().transfer.firewall_x.1);

        let goal = if !view.holding {
            view.source
        } else if self.hand.x < lane.1 + LANE_CLEARANCE {
            // Cross the band's lane horizontally, then turn toward the target
            let ahead = Point::new(lane.1 + LANE_CLEARANCE, self.hand.y);
            if self.hand.x < lane.0 - LANE_CLEARANCE {
                if let Some(band) = view.firewall.filter(|b| !b.cooling_down) {
                    if self.hand.y >= band.top - BAND_MARGIN && self.hand.y <= band.bottom + BAND_MARGIN {
                        return;
                    }
                }
            }
            ahead
        } else {
            view.target
        };
        self.hand = self.move_toward(goal, dt_ms);
    }

    fn move_toward(&self, goal: Point, dt_ms: f64) -> Point {
        let step = self.hand_speed * dt_ms.max(0.0) / 1000.0;
        let dist = self.hand.distance(&goal);
        if dist <= step || dist == 0.0 {
            return goal;
        }
        let k = step / dist;
        Point::new(self.hand.x + (goal.x - self.hand.x) * k, self.hand.y + (goal.y - self.hand.y) * k)
    }
}
