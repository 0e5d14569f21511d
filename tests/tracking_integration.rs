//! Integration tests for detector-backed estimators
//!
//! A scripted detector stands in for the landmark model; estimators are
//! initialized, attached to a session and driven frame by frame.

use std::sync::{Arc, Mutex};

use escape_core::core::tracking::{FrameGrabber, Interpret};
use escape_core::core::{
    CameraDevice, CameraSource, Delegate, GazeEstimator, HandEstimator, LandmarkDetector, MediaStream,
    MediaTrack, ModelAsset, SampleSource, Session, TrackingError, VideoFrame,
};
use escape_core::types::{
    GameConfig, GameEvent, InitStage, Landmark, Phase, ShockCause, TrackerKind, TrackerStatus, TrackingConfig,
};

struct StillGrabber;

impl FrameGrabber for StillGrabber {
    fn grab(&mut self) -> Option<VideoFrame> {
        Some(VideoFrame { width: 4, height: 4, ..Default::default() })
    }
}

struct Webcam;

impl CameraDevice for Webcam {
    fn request_stream(&mut self) -> Result<Arc<MediaStream>, TrackingError> {
        Ok(Arc::new(MediaStream::new(vec![MediaTrack::new("webcam")], Box::new(StillGrabber))))
    }
}

/// Returns whatever landmarks the test last put in the shared slot
struct ScriptedDetector {
    slot: Arc<Mutex<Vec<Landmark>>>,
}

impl LandmarkDetector for ScriptedDetector {
    fn load_runtime(&mut self) -> Result<(), TrackingError> {
        Ok(())
    }

    fn load_model(&mut self, _asset: &ModelAsset, _delegate: Delegate) -> Result<(), TrackingError> {
        Ok(())
    }

    fn detect(&mut self, _frame: &VideoFrame, _ts: f64) -> Result<Vec<Landmark>, TrackingError> {
        Ok(self.slot.lock().unwrap().clone())
    }
}

fn face(x: f64, y: f64) -> Vec<Landmark> {
    vec![Landmark::new(0.1, 0.1), Landmark::new(x, y), Landmark::new(0.9, 0.9)]
}

async fn ready_gaze(slot: &Arc<Mutex<Vec<Landmark>>>) -> GazeEstimator {
    let mut gaze = GazeEstimator::gaze(
        Box::new(ScriptedDetector { slot: Arc::clone(slot) }),
        ModelAsset::new("face_landmarker.task"),
        &TrackingConfig::default(),
    );
    gaze.initialize(CameraSource::Acquire(Box::new(Webcam))).await.unwrap();
    gaze
}

/// Status watchers see the ready milestone
#[tokio::test]
async fn test_status_watch_sees_ready() {
    let slot = Arc::new(Mutex::new(Vec::new()));
    let gaze = ready_gaze(&slot).await;
    let rx = gaze.subscribe();
    assert_eq!(*rx.borrow(), TrackerStatus::Ready);
    assert_eq!(gaze.milestones().last(), Some(&InitStage::CameraPermission));
}

/// Test calibration through a detector-backed estimator
#[tokio::test]
async fn test_estimator_drives_calibration() {
    let slot = Arc::new(Mutex::new(face(0.5, 0.5)));
    let gaze = ready_gaze(&slot).await;

    let mut session = Session::new(GameConfig { seed: Some(1), ..GameConfig::default() }).unwrap();
    session.attach_gaze(Box::new(gaze));
    assert_eq!(session.snapshot().gaze_status, TrackerStatus::Ready);

    for _ in 0..50 {
        session.advance(100.0);
    }
    assert!((session.snapshot().meters.signal - 50.0).abs() < 1e-9);

    // Face drifts out of the tolerance box
    *slot.lock().unwrap() = face(0.8, 0.5);
    session.advance(100.0);
    let events = session.drain_events();
    assert!(events.iter().any(|e| matches!(e, GameEvent::MeterShocked { cause: ShockCause::GazeLost, .. })));

    *slot.lock().unwrap() = face(0.5, 0.5);
    for _ in 0..100 {
        session.advance(100.0);
    }
    assert_eq!(session.phase(), Phase::Anxious);
}

/// Detector face loss opens and closes a presence window
#[tokio::test]
async fn test_detector_losing_face_opens_presence_window() {
    let slot = Arc::new(Mutex::new(face(0.5, 0.5)));
    let gaze = ready_gaze(&slot).await;
    let mut session = Session::new(GameConfig { seed: Some(1), ..GameConfig::default() }).unwrap();
    session.attach_gaze(Box::new(gaze));
    session.advance(100.0);

    slot.lock().unwrap().clear();
    session.advance(100.0);
    assert!(session.snapshot().presence_remaining_ms.is_some());
    let events = session.drain_events();
    assert!(events.iter().any(|e| matches!(e, GameEvent::PresenceWarning { .. })));

    *slot.lock().unwrap() = face(0.5, 0.5);
    session.advance(100.0);
    assert_eq!(session.snapshot().presence_remaining_ms, None);
}

/// Hand tracker borrows the gaze stream without owning it
#[tokio::test]
async fn test_hand_shares_gaze_camera() {
    let face_slot = Arc::new(Mutex::new(face(0.5, 0.5)));
    let mut gaze = ready_gaze(&face_slot).await;
    let stream = gaze.stream().unwrap();

    let hand_slot = Arc::new(Mutex::new(vec![Landmark::new(0.2, 0.4), Landmark::new(0.4, 0.6)]));
    let mut hand = HandEstimator::hand(
        Box::new(ScriptedDetector { slot: Arc::clone(&hand_slot) }),
        ModelAsset::new("hand_landmarker.task"),
        &TrackingConfig::default(),
    );
    hand.initialize(CameraSource::Shared(Arc::clone(&stream))).await.unwrap();
    assert!(!hand.owns_stream());

    let sample = hand.process(0.0);
    assert!(sample.detected);
    let p = sample.point.unwrap();
    // Centroid (0.3, 0.5), mirrored on x
    assert!((p.x - 0.7).abs() < 1e-9);
    assert!((p.y - 0.5).abs() < 1e-9);

    hand.teardown();
    assert!(stream.is_active());
    assert!(gaze.process(16.0).detected);

    drop(gaze);
    assert!(!stream.is_active());
}

/// Init failure reaches the session as an error status
#[tokio::test]
async fn test_init_failure_reported_to_session() {
    struct Broken;

    impl LandmarkDetector for Broken {
        fn load_module(&mut self) -> Result<(), TrackingError> {
            Err(TrackingError::ModuleLoad("bundle missing".into()))
        }

        fn load_runtime(&mut self) -> Result<(), TrackingError> {
            Ok(())
        }

        fn load_model(&mut self, _asset: &ModelAsset, _delegate: Delegate) -> Result<(), TrackingError> {
            Ok(())
        }

        fn detect(&mut self, _frame: &VideoFrame, _ts: f64) -> Result<Vec<Landmark>, TrackingError> {
            Ok(face(0.5, 0.5))
        }
    }

    let mut gaze = GazeEstimator::gaze(Box::new(Broken), ModelAsset::new("face.task"), &TrackingConfig::default());
    assert!(gaze.initialize(CameraSource::Acquire(Box::new(Webcam))).await.is_err());
    assert!(!gaze.is_ready());
    assert_eq!(gaze.stream().map(|s| s.is_active()), None);

    let mut session = Session::new(GameConfig { seed: Some(1), ..GameConfig::default() }).unwrap();
    session.attach_gaze(Box::new(gaze));
    for _ in 0..200 {
        session.advance(100.0);
    }
    let snap = session.snapshot();
    assert!(!snap.gaze.detected);
    assert_eq!(snap.phase, Phase::Trapped);
    assert!(session.drain_events().iter().any(|e| matches!(
        e,
        GameEvent::TrackerChanged { tracker: TrackerKind::Gaze, status: TrackerStatus::Error { .. } }
    )));
}

/// Interpreters report their tracker kind
#[test]
fn test_interpreter_kinds() {
    assert_eq!(<escape_core::core::tracking::GazeInterpreter as Interpret>::KIND, TrackerKind::Gaze);
    assert_eq!(<escape_core::core::tracking::HandInterpreter as Interpret>::KIND, TrackerKind::Hand);
}
