//! Core types for the escape run

mod sample;
mod phase;
mod meters;
mod status;
mod event;
mod config;
mod snapshot;

pub use sample::{Point, Landmark, TrackingSample};
pub use phase::Phase;
pub use meters::Meters;
pub use status::{TrackerKind, InitStage, TrackerStatus};
pub use event::{GameEvent, AudioCue, ToneKind, LoopKind, ShockCause, LockVariant, Key, Input};
pub use config::{GameConfig, MeterConfig, TrackingConfig, StageSpec, LockConfig, FirewallLevel, TransferConfig, MashConfig, PresenceConfig};
pub use snapshot::{SessionSnapshot, LockView, TransferView, FirewallView};
