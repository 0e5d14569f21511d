//! Meter values

use serde::{Deserialize, Serialize};
use crate::{GAZE_DURATION_CAP_MS, SIGNAL_MAX};

/// The four bounded meters owned by the meter engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Meters {
    /// Lock quality, 0-100
    pub signal: f64,
    /// Gaze consistency, 0-1
    pub stability: f64,
    /// Noise, 0-1, nominally `1 - stability`
    pub interference: f64,
    /// Continuous centered time, 0-20000 ms
    pub gaze_duration_ms: f64,
}

impl Default for Meters {
    fn default() -> Self {
        Self::initial()
    }
}

impl Meters {
    /// Values at the start of a run
    pub fn initial() -> Self {
        Self {
            signal: 0.0,
            stability: 0.0,
            interference: 1.0,
            gaze_duration_ms: 0.0,
        }
    }

    /// Resting values once calibration is done
    pub fn solved() -> Self {
        Self {
            signal: SIGNAL_MAX,
            stability: 1.0,
            interference: 0.0,
            gaze_duration_ms: 0.0,
        }
    }

    /// Clamp every meter into its bounds
    pub fn clamped(self) -> Self {
        Self {
            signal: self.signal.clamp(0.0, SIGNAL_MAX),
            stability: self.stability.clamp(0.0, 1.0),
            interference: self.interference.clamp(0.0, 1.0),
            gaze_duration_ms: self.gaze_duration_ms.clamp(0.0, GAZE_DURATION_CAP_MS),
        }
    }

    /// Are all meters within bounds?
    pub fn in_bounds(&self) -> bool {
        (0.0..=SIGNAL_MAX).contains(&self.signal)
            && (0.0..=1.0).contains(&self.stability)
            && (0.0..=1.0).contains(&self.interference)
            && (0.0..=GAZE_DURATION_CAP_MS).contains(&self.gaze_duration_ms)
    }
}
