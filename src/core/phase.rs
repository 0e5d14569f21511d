//! Phase state machine
//!
//! Transitions:
//! - TRAPPED → ANXIOUS: signal locked
//! - ANXIOUS → WORK: last lock stage hit
//! - WORK → BREAKING: enough blocks transferred
//! - BREAKING → AWAKENED: firewall progress full
//! - TRAPPED/ANXIOUS/WORK/BREAKING → FAILED: presence expired (latched)
//! - FAILED → TRAPPED: retry (trust penalty applies)
//! - any → TRAPPED: restart (fresh run)
//!
//! Triggers that do not apply to the current phase are ignored, which makes
//! repeated triggers in one frame harmless.

use tracing::{debug, info};

use crate::types::Phase;

/// Everything that can move the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SignalLocked,
    LockCompleted,
    TransfersComplete,
    FirewallBreached,
    PresenceExpired,
    Retry,
    Restart,
}

/// A transition that happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub retry: bool,
}

/// Single owner of the active phase
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    retry: bool,
    failed: bool,
    run_ended: bool,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Trapped,
            retry: false,
            failed: false,
            run_ended: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Is this run a retry after a failure?
    pub fn is_retry(&self) -> bool {
        self.retry
    }

    pub fn run_ended(&self) -> bool {
        self.run_ended
    }

    /// Apply a trigger; returns the transition if one happened
    pub fn fire(&mut self, trigger: Trigger) -> Option<Transition> {
        let next = match (self.phase, trigger) {
            (Phase::Trapped, Trigger::SignalLocked) => Phase::Anxious,
            (Phase::Anxious, Trigger::LockCompleted) => Phase::Work,
            (Phase::Work, Trigger::TransfersComplete) => Phase::Breaking,
            (Phase::Breaking, Trigger::FirewallBreached) => Phase::Awakened,
            (phase, Trigger::PresenceExpired) if phase.is_gaze_gated() && !self.failed => {
                self.failed = true;
                Phase::Failed
            }
            (Phase::Failed, Trigger::Retry) => {
                self.retry = true;
                self.failed = false;
                self.run_ended = false;
                Phase::Trapped
            }
            (_, Trigger::Restart) => {
                self.retry = false;
                self.failed = false;
                self.run_ended = false;
                Phase::Trapped
            }
            (phase, trigger) => {
                debug!(%phase, ?trigger, "trigger ignored");
                return None;
            }
        };
        let transition = Transition { from: self.phase, to: next, retry: self.retry };
        info!(from = %transition.from, to = %transition.to, retry = self.retry, "phase transition");
        self.phase = next;
        Some(transition)
    }

    /// The cinematic finished; true the first time only
    pub fn end_run(&mut self) -> bool {
        if self.phase != Phase::Awakened || self.run_ended {
            return false;
        }
        self.run_ended = true;
        info!("run ended");
        true
    }
}
