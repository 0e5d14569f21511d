//! Tracking estimators: gaze and hand
//!
//! An `Estimator` wraps an external landmark detector. It initializes
//! asynchronously through fixed milestones, then turns each video frame into a
//! `TrackingSample`. Published values pass through debounce gates, so
//! `take_changed()` only reports real changes.
//!
//! Camera ownership is fixed at acquisition: an estimator that opened the
//! camera stops its tracks on teardown; one handed an existing stream never
//! does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::error::TrackingError;
use crate::core::filter::{Debounced, PointSmoother};
use crate::types::{
    InitStage, Landmark, Point, TrackerKind, TrackerStatus, TrackingConfig, TrackingSample,
};

/// One captured video frame. The core never looks at the pixels.
#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: f64,
    pub pixels: Vec<u8>,
}

/// Pulls frames out of a capture pipeline
pub trait FrameGrabber: Send {
    fn grab(&mut self) -> Option<VideoFrame>;
}

/// One hardware track of a media stream
#[derive(Debug)]
pub struct MediaTrack {
    pub label: String,
    live: AtomicBool,
}

impl MediaTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), live: AtomicBool::new(true) }
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Camera stream shared by reference between estimators
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
    grabber: Mutex<Box<dyn FrameGrabber>>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream").field("tracks", &self.tracks).finish()
    }
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>, grabber: Box<dyn FrameGrabber>) -> Self {
        Self { tracks, grabber: Mutex::new(grabber) }
    }

    /// Latest frame, or None once the stream is stopped
    pub fn grab(&self) -> Option<VideoFrame> {
        if !self.is_active() {
            return None;
        }
        self.grabber.lock().ok()?.grab()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(MediaTrack::is_live)
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }
}

/// A camera that can be asked for a stream (permission prompt included)
pub trait CameraDevice: Send {
    fn request_stream(&mut self) -> Result<Arc<MediaStream>, TrackingError>;
}

/// How an estimator holds its stream
#[derive(Debug, Clone)]
pub enum StreamHandle {
    /// Acquired by this estimator; stopped on release
    Owned(Arc<MediaStream>),
    /// Borrowed from elsewhere; left running on release
    Shared(Arc<MediaStream>),
}

impl StreamHandle {
    pub fn stream(&self) -> &Arc<MediaStream> {
        match self {
            StreamHandle::Owned(s) | StreamHandle::Shared(s) => s,
        }
    }

    pub fn owns(&self) -> bool {
        matches!(self, StreamHandle::Owned(_))
    }

    /// Give the stream up, stopping it only if owned
    pub fn release(self) {
        if let StreamHandle::Owned(stream) = self {
            stream.stop_all();
        }
    }
}

/// Where an estimator gets its camera from
pub enum CameraSource {
    Shared(Arc<MediaStream>),
    Acquire(Box<dyn CameraDevice>),
}

/// Compute backend preference for the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegate {
    Accelerated,
    Baseline,
}

/// Reference to a model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    pub uri: String,
}

impl ModelAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// External pre-trained landmark detector
pub trait LandmarkDetector: Send {
    fn load_module(&mut self) -> Result<(), TrackingError> {
        Ok(())
    }

    fn load_runtime(&mut self) -> Result<(), TrackingError>;

    fn load_model(&mut self, asset: &ModelAsset, delegate: Delegate) -> Result<(), TrackingError>;

    /// Normalized landmarks for one frame; empty when nothing is found
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> Result<Vec<Landmark>, TrackingError>;
}

/// Turns raw landmarks into a sample
pub trait Interpret: Send {
    const KIND: TrackerKind;

    fn interpret(&mut self, landmarks: &[Landmark]) -> TrackingSample;

    fn reset(&mut self) {}
}

/// Face anchor position and the looking verdict
#[derive(Debug, Clone)]
pub struct GazeInterpreter {
    anchor: usize,
    tolerance_x: f64,
    tolerance_y: f64,
}

impl GazeInterpreter {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            anchor: config.anchor_landmark,
            tolerance_x: config.tolerance_x,
            tolerance_y: config.tolerance_y,
        }
    }

    /// Is `p` inside the tolerance box around frame center?
    pub fn is_centered(&self, p: Point) -> bool {
        (p.x - 0.5).abs() <= self.tolerance_x && (p.y - 0.5).abs() <= self.tolerance_y
    }
}

impl Interpret for GazeInterpreter {
    const KIND: TrackerKind = TrackerKind::Gaze;

    fn interpret(&mut self, landmarks: &[Landmark]) -> TrackingSample {
        match landmarks.get(self.anchor) {
            Some(anchor) => {
                let p = anchor.point();
                TrackingSample::face(p, self.is_centered(p))
            }
            None => TrackingSample::absent(),
        }
    }
}

/// Smoothed hand centroid
#[derive(Debug, Clone)]
pub struct HandInterpreter {
    smoother: PointSmoother,
    mirror: bool,
}

impl HandInterpreter {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            smoother: PointSmoother::new(config.smoothing_alpha),
            mirror: config.mirror,
        }
    }
}

impl Interpret for HandInterpreter {
    const KIND: TrackerKind = TrackerKind::Hand;

    fn interpret(&mut self, landmarks: &[Landmark]) -> TrackingSample {
        if landmarks.is_empty() {
            self.smoother.reset();
            return TrackingSample::absent();
        }
        let n = landmarks.len() as f64;
        let (sx, sy) = landmarks.iter().fold((0.0, 0.0), |(x, y), l| (x + l.x, y + l.y));
        let mut centroid = Point::new(sx / n, sy / n);
        if self.mirror {
            centroid.x = 1.0 - centroid.x;
        }
        TrackingSample::hand(self.smoother.update(centroid).clamped())
    }

    fn reset(&mut self) {
        self.smoother.reset();
    }
}

/// Anything that produces one tracking sample per frame
pub trait SampleSource: Send {
    /// Sample for this frame; None leaves the previous sample in place
    fn next_sample(&mut self, now_ms: f64) -> Option<TrackingSample>;

    fn status(&self) -> TrackerStatus;

    fn is_ready(&self) -> bool {
        self.status().is_ready()
    }
}

/// Detector-backed estimator
pub struct Estimator<I> {
    interpreter: I,
    detector: Box<dyn LandmarkDetector>,
    asset: ModelAsset,
    status_tx: watch::Sender<TrackerStatus>,
    milestones: Vec<InitStage>,
    delegate: Option<Delegate>,
    stream: Option<StreamHandle>,
    detected: Debounced<bool>,
    point: Debounced<Option<Point>>,
    looking: Debounced<Option<bool>>,
    published: TrackingSample,
    changed: bool,
}

pub type GazeEstimator = Estimator<GazeInterpreter>;
pub type HandEstimator = Estimator<HandInterpreter>;

impl GazeEstimator {
    pub fn gaze(detector: Box<dyn LandmarkDetector>, asset: ModelAsset, config: &TrackingConfig) -> Self {
        Estimator::new(GazeInterpreter::new(config), detector, asset, config.publish_epsilon)
    }
}

impl HandEstimator {
    pub fn hand(detector: Box<dyn LandmarkDetector>, asset: ModelAsset, config: &TrackingConfig) -> Self {
        Estimator::new(HandInterpreter::new(config), detector, asset, config.publish_epsilon)
    }
}

impl<I: Interpret> Estimator<I> {
    pub fn new(interpreter: I, detector: Box<dyn LandmarkDetector>, asset: ModelAsset, epsilon: f64) -> Self {
        let (status_tx, _) = watch::channel(TrackerStatus::Idle);
        Self {
            interpreter,
            detector,
            asset,
            status_tx,
            milestones: Vec::new(),
            delegate: None,
            stream: None,
            detected: Debounced::exact(),
            point: Debounced::new(epsilon),
            looking: Debounced::exact(),
            published: TrackingSample::absent(),
            changed: false,
        }
    }

    /// Watch status transitions
    pub fn subscribe(&self) -> watch::Receiver<TrackerStatus> {
        self.status_tx.subscribe()
    }

    /// Milestones reached so far
    pub fn milestones(&self) -> &[InitStage] {
        &self.milestones
    }

    /// Backend the model ended up on
    pub fn delegate(&self) -> Option<Delegate> {
        self.delegate
    }

    /// The camera stream, for sharing with another estimator
    pub fn stream(&self) -> Option<Arc<MediaStream>> {
        self.stream.as_ref().map(|h| Arc::clone(h.stream()))
    }

    pub fn owns_stream(&self) -> bool {
        self.stream.as_ref().map(StreamHandle::owns).unwrap_or(false)
    }

    /// Run the staged init. On failure the estimator stays in `Error` for good.
    pub async fn initialize(&mut self, camera: CameraSource) -> Result<(), TrackingError> {
        if self.status_tx.borrow().is_terminal() {
            return match &*self.status_tx.borrow() {
                TrackerStatus::Ready => Ok(()),
                _ => Err(TrackingError::NotReady),
            };
        }
        match self.run_init(camera).await {
            Ok(()) => {
                info!(tracker = %I::KIND, delegate = ?self.delegate, "tracker ready");
                self.status_tx.send_replace(TrackerStatus::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(tracker = %I::KIND, error = %e, "tracker init failed");
                self.status_tx.send_replace(TrackerStatus::Error { message: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run_init(&mut self, camera: CameraSource) -> Result<(), TrackingError> {
        self.enter_stage(InitStage::ModuleLoad);
        self.detector.load_module()?;
        tokio::task::yield_now().await;

        self.enter_stage(InitStage::RuntimeLoad);
        self.detector.load_runtime()?;
        tokio::task::yield_now().await;

        self.enter_stage(InitStage::ModelLoad);
        let delegate = match self.detector.load_model(&self.asset, Delegate::Accelerated) {
            Ok(()) => Delegate::Accelerated,
            Err(e) => {
                warn!(tracker = %I::KIND, error = %e, "accelerated delegate failed, using baseline");
                self.detector.load_model(&self.asset, Delegate::Baseline)?;
                Delegate::Baseline
            }
        };
        self.delegate = Some(delegate);
        tokio::task::yield_now().await;

        self.enter_stage(InitStage::CameraPermission);
        let handle = match camera {
            CameraSource::Shared(stream) => StreamHandle::Shared(stream),
            CameraSource::Acquire(mut device) => StreamHandle::Owned(device.request_stream()?),
        };
        self.stream = Some(handle);
        Ok(())
    }

    fn enter_stage(&mut self, stage: InitStage) {
        debug!(tracker = %I::KIND, ?stage, "init milestone");
        self.milestones.push(stage);
        self.status_tx.send_replace(TrackerStatus::Loading { stage });
    }

    /// Run the detector on the current frame and publish the result
    pub fn process(&mut self, timestamp_ms: f64) -> TrackingSample {
        if !self.status_tx.borrow().is_ready() {
            return self.publish(TrackingSample::absent());
        }
        let frame = match self.stream.as_ref().and_then(|h| h.stream().grab()) {
            Some(frame) => frame,
            None => return self.published,
        };
        let sample = match self.detector.detect(&frame, timestamp_ms) {
            Ok(landmarks) => self.interpreter.interpret(&landmarks),
            Err(e) => {
                debug!(tracker = %I::KIND, error = %e, "detection failed for frame");
                self.interpreter.reset();
                TrackingSample::absent()
            }
        };
        self.publish(sample)
    }

    fn publish(&mut self, sample: TrackingSample) -> TrackingSample {
        let detected = self.detected.offer(sample.detected);
        let point = self.point.offer(sample.point);
        let looking = self.looking.offer(sample.looking);
        if detected || point || looking {
            self.changed = true;
            self.published = TrackingSample {
                detected: self.detected.get().unwrap_or(false),
                point: self.point.get().flatten(),
                looking: self.looking.get().flatten(),
            };
        }
        self.published
    }

    /// Last published sample
    pub fn published(&self) -> TrackingSample {
        self.published
    }

    /// Did the published sample change since the last call?
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Release the camera and clear filters
    pub fn teardown(&mut self) {
        if let Some(handle) = self.stream.take() {
            handle.release();
        }
        self.interpreter.reset();
        self.detected.reset();
        self.point.reset();
        self.looking.reset();
        self.published = TrackingSample::absent();
    }
}

impl<I> Drop for Estimator<I> {
    fn drop(&mut self) {
        if let Some(handle) = self.stream.take() {
            handle.release();
        }
    }
}

impl<I: Interpret> SampleSource for Estimator<I> {
    fn next_sample(&mut self, now_ms: f64) -> Option<TrackingSample> {
        Some(self.process(now_ms))
    }

    fn status(&self) -> TrackerStatus {
        self.status_tx.borrow().clone()
    }
}

/// Synthetic feed driven by a closure of the frame time
pub struct ScriptedSource {
    script: Box<dyn FnMut(f64) -> Option<TrackingSample> + Send>,
    status: TrackerStatus,
}

impl ScriptedSource {
    pub fn from_fn(script: impl FnMut(f64) -> Option<TrackingSample> + Send + 'static) -> Self {
        Self { script: Box::new(script), status: TrackerStatus::Ready }
    }

    /// Same sample every frame
    pub fn constant(sample: TrackingSample) -> Self {
        Self::from_fn(move |_| Some(sample))
    }

    /// A source whose init failed; never detects anything
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            script: Box::new(|_| Some(TrackingSample::absent())),
            status: TrackerStatus::Error { message: message.into() },
        }
    }
}

impl SampleSource for ScriptedSource {
    fn next_sample(&mut self, now_ms: f64) -> Option<TrackingSample> {
        (self.script)(now_ms)
    }

    fn status(&self) -> TrackerStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StillGrabber;

    impl FrameGrabber for StillGrabber {
        fn grab(&mut self) -> Option<VideoFrame> {
            Some(VideoFrame { width: 2, height: 2, ..Default::default() })
        }
    }

    struct FakeCamera {
        deny: bool,
    }

    impl CameraDevice for FakeCamera {
        fn request_stream(&mut self) -> Result<Arc<MediaStream>, TrackingError> {
            if self.deny {
                return Err(TrackingError::Camera("permission denied".into()));
            }
            Ok(Arc::new(MediaStream::new(vec![MediaTrack::new("cam")], Box::new(StillGrabber))))
        }
    }

    struct FakeDetector {
        landmarks: Arc<Mutex<Vec<Landmark>>>,
        fail_accelerated: bool,
        fail_runtime: bool,
    }

    impl FakeDetector {
        fn new(landmarks: Arc<Mutex<Vec<Landmark>>>) -> Self {
            Self { landmarks, fail_accelerated: false, fail_runtime: false }
        }
    }

    impl LandmarkDetector for FakeDetector {
        fn load_runtime(&mut self) -> Result<(), TrackingError> {
            if self.fail_runtime {
                return Err(TrackingError::RuntimeLoad("no wasm".into()));
            }
            Ok(())
        }

        fn load_model(&mut self, _asset: &ModelAsset, delegate: Delegate) -> Result<(), TrackingError> {
            if self.fail_accelerated && delegate == Delegate::Accelerated {
                return Err(TrackingError::ModelLoad("no gpu".into()));
            }
            Ok(())
        }

        fn detect(&mut self, _frame: &VideoFrame, _ts: f64) -> Result<Vec<Landmark>, TrackingError> {
            Ok(self.landmarks.lock().unwrap().clone())
        }
    }

    fn face_at(x: f64, y: f64) -> Vec<Landmark> {
        vec![Landmark::new(0.0, 0.0), Landmark::new(x, y)]
    }

    #[tokio::test]
    async fn test_init_reaches_ready_through_milestones() {
        let feed = Arc::new(Mutex::new(Vec::new()));
        let mut gaze = GazeEstimator::gaze(
            Box::new(FakeDetector::new(feed)),
            ModelAsset::new("face.task"),
            &TrackingConfig::default(),
        );
        let rx = gaze.subscribe();
        gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await.unwrap();
        assert_eq!(*rx.borrow(), TrackerStatus::Ready);
        assert_eq!(
            gaze.milestones(),
            &[InitStage::ModuleLoad, InitStage::RuntimeLoad, InitStage::ModelLoad, InitStage::CameraPermission]
        );
        assert_eq!(gaze.delegate(), Some(Delegate::Accelerated));
        assert!(gaze.owns_stream());
    }

    #[tokio::test]
    async fn test_model_falls_back_to_baseline() {
        let mut detector = FakeDetector::new(Arc::new(Mutex::new(Vec::new())));
        detector.fail_accelerated = true;
        let mut gaze = GazeEstimator::gaze(Box::new(detector), ModelAsset::new("face.task"), &TrackingConfig::default());
        gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await.unwrap();
        assert_eq!(gaze.delegate(), Some(Delegate::Baseline));
    }

    #[tokio::test]
    async fn test_failed_init_never_detects() {
        let feed = Arc::new(Mutex::new(face_at(0.5, 0.5)));
        let mut detector = FakeDetector::new(feed);
        detector.fail_runtime = true;
        let mut gaze = GazeEstimator::gaze(Box::new(detector), ModelAsset::new("face.task"), &TrackingConfig::default());
        let result = gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await;
        assert!(matches!(result, Err(TrackingError::RuntimeLoad(_))));
        assert!(matches!(gaze.status(), TrackerStatus::Error { .. }));
        for t in 0..10 {
            assert!(!gaze.process(t as f64 * 16.0).detected);
        }
        // No retry on a second call
        let again = gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await;
        assert_eq!(again, Err(TrackingError::NotReady));
    }

    #[tokio::test]
    async fn test_camera_denied_is_error_state() {
        let mut gaze = GazeEstimator::gaze(
            Box::new(FakeDetector::new(Arc::new(Mutex::new(Vec::new())))),
            ModelAsset::new("face.task"),
            &TrackingConfig::default(),
        );
        let result = gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: true }))).await;
        assert!(matches!(result, Err(TrackingError::Camera(_))));
        assert!(!gaze.is_ready());
    }

    #[tokio::test]
    async fn test_looking_tolerance_box() {
        let feed = Arc::new(Mutex::new(face_at(0.5, 0.5)));
        let mut gaze = GazeEstimator::gaze(
            Box::new(FakeDetector::new(Arc::clone(&feed))),
            ModelAsset::new("face.task"),
            &TrackingConfig::default(),
        );
        gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await.unwrap();

        assert_eq!(gaze.process(0.0).looking, Some(true));

        *feed.lock().unwrap() = face_at(0.61, 0.67);
        assert_eq!(gaze.process(16.0).looking, Some(true));

        *feed.lock().unwrap() = face_at(0.63, 0.5);
        assert_eq!(gaze.process(32.0).looking, Some(false));

        *feed.lock().unwrap() = face_at(0.5, 0.3);
        assert_eq!(gaze.process(48.0).looking, Some(false));

        *feed.lock().unwrap() = Vec::new();
        let sample = gaze.process(64.0);
        assert!(!sample.detected);
        assert_eq!(sample.point, None);
    }

    #[tokio::test]
    async fn test_changes_published_only_on_change() {
        let feed = Arc::new(Mutex::new(face_at(0.5, 0.5)));
        let mut gaze = GazeEstimator::gaze(
            Box::new(FakeDetector::new(Arc::clone(&feed))),
            ModelAsset::new("face.task"),
            &TrackingConfig::default(),
        );
        gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await.unwrap();
        gaze.process(0.0);
        assert!(gaze.take_changed());
        gaze.process(16.0);
        assert!(!gaze.take_changed());

        *feed.lock().unwrap() = face_at(0.5005, 0.5);
        gaze.process(32.0);
        assert!(!gaze.take_changed());

        *feed.lock().unwrap() = face_at(0.55, 0.5);
        gaze.process(48.0);
        assert!(gaze.take_changed());
    }

    #[tokio::test]
    async fn test_shared_stream_survives_borrower_teardown() {
        let feed = Arc::new(Mutex::new(face_at(0.5, 0.5)));
        let config = TrackingConfig::default();
        let mut gaze = GazeEstimator::gaze(Box::new(FakeDetector::new(Arc::clone(&feed))), ModelAsset::new("face.task"), &config);
        gaze.initialize(CameraSource::Acquire(Box::new(FakeCamera { deny: false }))).await.unwrap();
        let stream = gaze.stream().unwrap();

        let mut hand = HandEstimator::hand(Box::new(FakeDetector::new(feed)), ModelAsset::new("hand.task"), &config);
        hand.initialize(CameraSource::Shared(Arc::clone(&stream))).await.unwrap();
        assert!(!hand.owns_stream());

        hand.teardown();
        assert!(stream.is_active());

        gaze.teardown();
        assert!(!stream.is_active());
    }

    #[test]
    fn test_hand_centroid_mirrored() {
        let mut interp = HandInterpreter::new(&TrackingConfig::default());
        let sample = interp.interpret(&[Landmark::new(0.1, 0.2), Landmark::new(0.3, 0.4)]);
        let p = sample.point.unwrap();
        assert!((p.x - 0.8).abs() < 1e-9);
        assert!((p.y - 0.3).abs() < 1e-9);
        assert!(sample.detected);
        assert_eq!(sample.looking, None);
    }

    #[test]
    fn test_scripted_failed_source() {
        let mut source = ScriptedSource::failed("no camera");
        assert!(!source.is_ready());
        assert_eq!(source.next_sample(0.0), Some(TrackingSample::absent()));
    }
}
