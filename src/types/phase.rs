//! Game phase definitions

use colored::Color;
use serde::{Deserialize, Serialize};

/// Discrete phases of a run. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Calibration: hold a centered gaze until the signal locks
    Trapped,
    /// Lock minigame, three stages
    Anxious,
    /// Block transfer under the firewall
    Work,
    /// Key-mash through the firewall
    Breaking,
    /// Escaped; cinematic then final input
    Awakened,
    /// Presence lost for too long
    Failed,
}

impl Phase {
    /// Phases in which losing the face can fail the run
    pub fn is_gaze_gated(&self) -> bool {
        matches!(
            self,
            Phase::Trapped | Phase::Anxious | Phase::Work | Phase::Breaking
        )
    }

    /// Phases where meters keep integrating tracking signals
    pub fn meters_live(&self) -> bool {
        matches!(self, Phase::Trapped)
    }

    /// Terminal color for this phase
    pub fn color(&self) -> Color {
        match self {
            Phase::Trapped => Color::BrightBlack,
            Phase::Anxious => Color::Yellow,
            Phase::Work => Color::Cyan,
            Phase::Breaking => Color::Magenta,
            Phase::Awakened => Color::Green,
            Phase::Failed => Color::Red,
        }
    }

    /// Glyph for terminal output
    pub fn glyph(&self) -> &'static str {
        match self {
            Phase::Trapped => "▣",
            Phase::Anxious => "◎",
            Phase::Work => "⇄",
            Phase::Breaking => "▓",
            Phase::Awakened => "☀",
            Phase::Failed => "✖",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Trapped => "TRAPPED",
            Phase::Anxious => "ANXIOUS",
            Phase::Work => "WORK",
            Phase::Breaking => "BREAKING",
            Phase::Awakened => "AWAKENED",
            Phase::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}
