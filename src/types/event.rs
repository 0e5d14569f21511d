//! Event taxonomy
//!
//! Every state mutation in a session produces one or more `GameEvent`s.
//! Audio and presentation collaborators react to these; they never read
//! session internals directly.

use serde::{Deserialize, Serialize};
use crate::types::{Phase, TrackerKind, TrackerStatus};

/// Why a shock fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockCause {
    /// Face still detected but no longer looking
    GazeLost,
    /// Face no longer detected at all
    FaceLost,
}

/// Lock minigame variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockVariant {
    /// Cursor ping-pongs along a track
    #[default]
    Linear,
    /// Needle wraps around a ring
    Radial,
}

/// Procedural one-shot tones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneKind {
    Shock,
    LockHit,
    LockMiss,
    Grab,
    Deliver,
    TransferError,
    Mash,
    Breach,
    Warning,
    PhaseUp,
    Failure,
}

/// Background loops, one per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Hum,
    Pulse,
    Drone,
    Alarm,
    Choir,
    Static,
}

/// Requests to the audio/speech collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    Tone { kind: ToneKind },
    LoopStart { kind: LoopKind, volume: f64 },
    LoopStop { kind: LoopKind },
    Speak { text: String },
}

impl AudioCue {
    /// Cues that a browser refuses before the first user gesture
    pub fn needs_gesture(&self) -> bool {
        matches!(self, AudioCue::LoopStart { .. } | AudioCue::Speak { .. })
    }
}

/// Typed record of a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    PhaseChanged { from: Phase, to: Phase, retry: bool },
    RunEnded,
    FinalMessage { text: String },
    MeterShocked { cause: ShockCause, signal: f64, stability: f64, interference: f64 },
    GlitchStarted { cause: ShockCause },
    GlitchEnded,
    TrackerChanged { tracker: TrackerKind, status: TrackerStatus },
    MinigameHit { variant: LockVariant, stage: u8 },
    MinigameMiss { variant: LockVariant, stage: u8 },
    StageChanged { stage: u8 },
    LockCompleted,
    BlockGrabbed,
    BlockDelivered { count: u32 },
    TransferError { count: u32 },
    CarryCancelled,
    TransferTaskComplete { count: u32 },
    FirewallProgress { value: f64 },
    FirewallBreached,
    PresenceWarning { grace_ms: f64 },
    PresenceCountdown { remaining_ms: f64 },
    PresenceCancelled,
    PresenceExpired,
    Flash { duration_ms: f64 },
    ScreenShake { duration_ms: f64 },
    Audio { cue: AudioCue },
}

impl GameEvent {
    /// Stable code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "E001_PHASE_CHANGED",
            Self::RunEnded => "E002_RUN_ENDED",
            Self::FinalMessage { .. } => "E003_FINAL_MESSAGE",
            Self::MeterShocked { .. } => "E010_METER_SHOCKED",
            Self::GlitchStarted { .. } => "E011_GLITCH_STARTED",
            Self::GlitchEnded => "E012_GLITCH_ENDED",
            Self::TrackerChanged { .. } => "E020_TRACKER_CHANGED",
            Self::MinigameHit { .. } => "E030_MINIGAME_HIT",
            Self::MinigameMiss { .. } => "E031_MINIGAME_MISS",
            Self::StageChanged { .. } => "E032_STAGE_CHANGED",
            Self::LockCompleted => "E033_LOCK_COMPLETED",
            Self::BlockGrabbed => "E040_BLOCK_GRABBED",
            Self::BlockDelivered { .. } => "E041_BLOCK_DELIVERED",
            Self::TransferError { .. } => "E042_TRANSFER_ERROR",
            Self::CarryCancelled => "E043_CARRY_CANCELLED",
            Self::TransferTaskComplete { .. } => "E044_TRANSFER_COMPLETE",
            Self::FirewallProgress { .. } => "E050_FIREWALL_PROGRESS",
            Self::FirewallBreached => "E051_FIREWALL_BREACHED",
            Self::PresenceWarning { .. } => "E060_PRESENCE_WARNING",
            Self::PresenceCountdown { .. } => "E061_PRESENCE_COUNTDOWN",
            Self::PresenceCancelled => "E062_PRESENCE_CANCELLED",
            Self::PresenceExpired => "E063_PRESENCE_EXPIRED",
            Self::Flash { .. } => "E070_FLASH",
            Self::ScreenShake { .. } => "E071_SCREEN_SHAKE",
            Self::Audio { .. } => "E080_AUDIO",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "Phase changed",
            Self::RunEnded => "Run ended",
            Self::FinalMessage { .. } => "Final message submitted",
            Self::MeterShocked { .. } => "Meters shocked",
            Self::GlitchStarted { .. } => "Glitch pulse started",
            Self::GlitchEnded => "Glitch pulse ended",
            Self::TrackerChanged { .. } => "Tracker status changed",
            Self::MinigameHit { .. } => "Lock hit",
            Self::MinigameMiss { .. } => "Lock missed",
            Self::StageChanged { .. } => "Lock stage changed",
            Self::LockCompleted => "Lock sequence complete",
            Self::BlockGrabbed => "Block picked up",
            Self::BlockDelivered { .. } => "Block delivered",
            Self::TransferError { .. } => "Firewall hit during carry",
            Self::CarryCancelled => "Hand lost, carry cancelled",
            Self::TransferTaskComplete { .. } => "All blocks transferred",
            Self::FirewallProgress { .. } => "Firewall progress",
            Self::FirewallBreached => "Firewall breached",
            Self::PresenceWarning { .. } => "Presence warning",
            Self::PresenceCountdown { .. } => "Presence countdown",
            Self::PresenceCancelled => "Presence restored",
            Self::PresenceExpired => "Presence expired",
            Self::Flash { .. } => "Flash",
            Self::ScreenShake { .. } => "Screen shake",
            Self::Audio { .. } => "Audio request",
        }
    }
}

impl std::fmt::Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// Keys the core cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Space,
    Enter,
    Escape,
    Char(char),
}

impl std::str::FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Space" | " " | "space" => Ok(Key::Space),
            "Enter" | "enter" => Ok(Key::Enter),
            "Escape" | "escape" | "Esc" => Ok(Key::Escape),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Key::Char(c.to_ascii_lowercase())),
                    _ => Err(format!("unknown key: {}", s)),
                }
            }
        }
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Space => write!(f, "Space"),
            Key::Enter => write!(f, "Enter"),
            Key::Escape => write!(f, "Escape"),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// User-originated input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Input {
    Key { key: Key },
    Pointer,
}

impl Input {
    pub const SPACE: Input = Input::Key { key: Key::Space };

    /// Space and pointer presses are the universal attempt input
    pub fn is_attempt(&self) -> bool {
        matches!(self, Input::Pointer | Input::Key { key: Key::Space })
    }
}
