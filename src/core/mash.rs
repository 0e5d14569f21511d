//! Key-mash accumulator for breaking the firewall

use crate::types::{Input, Key, MashConfig};

/// Full firewall progress
pub const MASH_FULL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MashOutcome {
    Progress(f64),
    /// Reached full; the accumulator deactivates itself
    Breached,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct KeyMash {
    /// Progress added per qualifying press
    increment: f64,
    decay_per_sec: f64,
    /// Keys that count, besides pointer presses
    keys: Vec<Key>,
    /// Percent, 0..=100
    progress: f64,
    active: bool,
}

impl KeyMash {
    pub fn new(config: &MashConfig) -> Self {
        Self {
            increment: config.increment,
            decay_per_sec: config.decay_per_sec,
            keys: config.keys.clone(),
            progress: 0.0,
            active: false,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.progress = 0.0;
        self.active = true;
    }

    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.active = false;
    }

    fn qualifies(&self, input: &Input) -> bool {
        match input {
            Input::Key { key } => self.keys.contains(key),
            Input::Pointer => false,
        }
    }

    pub fn press(&mut self, input: &Input) -> MashOutcome {
        if !self.active || !self.qualifies(input) {
            return MashOutcome::Ignored;
        }
        self.progress = (self.progress + self.increment).min(MASH_FULL);
        if self.progress >= MASH_FULL {
            self.active = false;
            MashOutcome::Breached
        } else {
            MashOutcome::Progress(self.progress)
        }
    }

    /// Continuous decay between presses
    pub fn tick(&mut self, dt_ms: f64) {
        if self.active {
            self.progress = (self.progress - self.decay_per_sec * dt_ms.max(0.0) / 1000.0).max(0.0);
        }
    }
}
