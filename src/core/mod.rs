//! Core modules for the escape run

pub mod error;
pub mod filter;
pub mod tracking;
pub mod scheduler;
pub mod meters;
pub mod phase;
pub mod lock;
pub mod transfer;
pub mod mash;
pub mod presence;
pub mod audio;
pub mod events;
pub mod session;
pub mod autopilot;
pub mod api;

pub use error::{TrackingError, ConfigError, SessionError};
pub use filter::{Debounced, Ema, PointSmoother};
pub use tracking::{
    CameraDevice, CameraSource, Delegate, Estimator, GazeEstimator, HandEstimator, LandmarkDetector,
    MediaStream, MediaTrack, ModelAsset, SampleSource, ScriptedSource, StreamHandle, VideoFrame,
};
pub use scheduler::{FrameScheduler, FrameTime, Control, TimerQueue};
pub use meters::{MeterEngine, MeterTick, shock_edge};
pub use phase::{PhaseMachine, Trigger, Transition};
pub use lock::{LockGame, LockOutcome};
pub use transfer::{TransferTask, TransferOutcome};
pub use mash::{KeyMash, MashOutcome};
pub use presence::{PresenceMonitor, PresenceTick};
pub use audio::{AudioGate, synthesize};
pub use events::EventBus;
pub use session::Session;
pub use autopilot::Autopilot;
pub use api::{create_router, run_server};
