//! Session controller: one run of the experience
//!
//! The session owns the phase machine and every engine. Each looping
//! subsystem is a named scheduler task that belongs to a phase and stops
//! itself once that phase is over. Tasks never change the phase directly:
//! they queue a `Trigger`, and the session applies queued triggers after
//! each frame and after each input.

use std::collections::VecDeque;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::core::audio::{phase_line, phase_loop, AudioGate};
use crate::core::error::{ConfigError, SessionError};
use crate::core::events::{EventBus, SubscriptionId};
use crate::core::lock::{LockGame, LockOutcome};
use crate::core::mash::{KeyMash, MashOutcome, MASH_FULL};
use crate::core::meters::{shock_edge, MeterEngine, MeterTick};
use crate::core::phase::{PhaseMachine, Transition, Trigger};
use crate::core::presence::{PresenceMonitor, PresenceTick};
use crate::core::scheduler::{Control, FrameScheduler, FrameTime, TimerQueue};
use crate::core::tracking::SampleSource;
use crate::core::transfer::{TransferOutcome, TransferTask};
use crate::types::{
    AudioCue, GameConfig, GameEvent, Input, Phase, SessionSnapshot, ShockCause, ToneKind,
    TrackerKind, TrackerStatus, TrackingSample,
};

/// Tasks that belong to a phase; all are cancelled on every transition
const PHASE_TASKS: [&str; 5] = ["meters", "lock", "transfer", "mash", "presence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    EndGlitch,
}

/// Everything the scheduler's tasks operate on
struct World {
    /// Validated tunables for this session
    config: GameConfig,
    /// Zone and target placement; seeded when the config has a seed
    rng: StdRng,
    /// Sum of every frame step so far
    clock_ms: f64,
    phase: PhaseMachine,
    meters: MeterEngine,
    lock: LockGame,
    transfer: TransferTask,
    mash: KeyMash,
    presence: PresenceMonitor,
    /// Holds loops and speech until the first input
    audio: AudioGate,
    bus: EventBus,
    /// One-shot timers (glitch pulse end)
    timers: TimerQueue<TimerAction>,
    /// Triggers raised by tasks, applied by `Session::settle`
    pending: VecDeque<Trigger>,
    /// Latest gaze sample
    gaze: TrackingSample,
    /// Latest hand sample
    hand: TrackingSample,
    gaze_status: TrackerStatus,
    hand_status: TrackerStatus,
    /// A shock's glitch pulse is running
    glitching: bool,
    /// Accepted once after the run ends
    final_message: Option<String>,
}

impl World {
    fn emit(&mut self, event: GameEvent) {
        self.bus.emit(event);
    }

    fn cue(&mut self, cue: AudioCue) {
        if let Some(cue) = self.audio.request(cue) {
            self.bus.emit(GameEvent::Audio { cue });
        }
    }

    fn tone(&mut self, kind: ToneKind) {
        self.cue(AudioCue::Tone { kind });
    }

    fn set_status(&mut self, tracker: TrackerKind, status: TrackerStatus) {
        let slot = match tracker {
            TrackerKind::Gaze => &mut self.gaze_status,
            TrackerKind::Hand => &mut self.hand_status,
        };
        if *slot == status {
            return;
        }
        *slot = status.clone();
        match &status {
            TrackerStatus::Error { message } => warn!(%tracker, %message, "tracker failed"),
            other => debug!(%tracker, status = %other, "tracker status"),
        }
        self.emit(GameEvent::TrackerChanged { tracker, status });
    }

    fn observe_gaze(&mut self, sample: TrackingSample) {
        let prev = std::mem::replace(&mut self.gaze, sample);
        let phase = self.phase.phase();

        if phase == Phase::Trapped {
            if let Some(cause) = shock_edge(&prev, &sample) {
                self.shock(cause);
            }
        }

        if prev.detected && !sample.detected {
            let armed = phase.is_gaze_gated() && self.gaze_status.is_ready();
            if let Some(start) = self.presence.face_lost(self.clock_ms, armed) {
                if start.warn {
                    let grace_ms = self.config.presence.grace_ms;
                    let text = self.config.presence.warning_text.clone();
                    self.emit(GameEvent::PresenceWarning { grace_ms });
                    self.tone(ToneKind::Warning);
                    self.cue(AudioCue::Speak { text });
                }
            }
        } else if !prev.detected && sample.detected && self.presence.face_found() {
            self.emit(GameEvent::PresenceCancelled);
        }
    }

    fn observe_hand(&mut self, sample: TrackingSample) {
        self.hand = sample;
    }

    fn shock(&mut self, cause: ShockCause) {
        let Some(m) = self.meters.shock(cause) else {
            return;
        };
        self.emit(GameEvent::MeterShocked {
            cause,
            signal: m.signal,
            stability: m.stability,
            interference: m.interference,
        });
        self.emit(GameEvent::GlitchStarted { cause });
        self.tone(ToneKind::Shock);
        self.glitching = true;
        self.timers.cancel_where(|a| *a == TimerAction::EndGlitch);
        self.timers.schedule(self.clock_ms, self.config.meters.glitch_pulse_ms, TimerAction::EndGlitch);
    }

    fn fire_timers(&mut self) {
        for action in self.timers.pop_due(self.clock_ms) {
            match action {
                TimerAction::EndGlitch => {
                    self.glitching = false;
                    self.emit(GameEvent::GlitchEnded);
                }
            }
        }
    }

    fn input(&mut self, input: Input) {
        for cue in self.audio.unlock() {
            self.emit(GameEvent::Audio { cue });
        }
        match self.phase.phase() {
            Phase::Anxious if input.is_attempt() => {
                let outcome = self.lock.attempt(&mut self.rng);
                self.on_lock(outcome);
            }
            Phase::Breaking => match self.mash.press(&input) {
                MashOutcome::Progress(value) => {
                    self.emit(GameEvent::FirewallProgress { value });
                    self.tone(ToneKind::Mash);
                }
                MashOutcome::Breached => {
                    self.emit(GameEvent::FirewallProgress { value: MASH_FULL });
                    self.emit(GameEvent::FirewallBreached);
                    self.tone(ToneKind::Breach);
                    self.pending.push_back(Trigger::FirewallBreached);
                }
                MashOutcome::Ignored => {}
            },
            phase => debug!(%phase, ?input, "input ignored"),
        }
    }

    fn on_lock(&mut self, outcome: LockOutcome) {
        let variant = self.lock.variant();
        let flash = self.config.lock.hit_flash_ms;
        let shake = self.config.lock.miss_shake_ms;
        match outcome {
            LockOutcome::Hit { stage, next } => {
                self.emit(GameEvent::MinigameHit { variant, stage });
                self.emit(GameEvent::Flash { duration_ms: flash });
                self.tone(ToneKind::LockHit);
                self.emit(GameEvent::StageChanged { stage: next });
            }
            LockOutcome::Miss { stage, next } => {
                self.emit(GameEvent::MinigameMiss { variant, stage });
                self.emit(GameEvent::ScreenShake { duration_ms: shake });
                self.tone(ToneKind::LockMiss);
                if next != stage {
                    self.emit(GameEvent::StageChanged { stage: next });
                }
            }
            LockOutcome::Completed { stage } => {
                self.emit(GameEvent::MinigameHit { variant, stage });
                self.emit(GameEvent::Flash { duration_ms: flash });
                self.tone(ToneKind::LockHit);
                self.emit(GameEvent::LockCompleted);
                self.pending.push_back(Trigger::LockCompleted);
            }
            LockOutcome::Ignored => {}
        }
    }

    fn on_transfer(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Grabbed => {
                self.emit(GameEvent::BlockGrabbed);
                self.tone(ToneKind::Grab);
            }
            TransferOutcome::Delivered { count } => {
                self.emit(GameEvent::BlockDelivered { count });
                self.tone(ToneKind::Deliver);
                if count >= self.config.transfer.advance_at {
                    self.pending.push_back(Trigger::TransfersComplete);
                }
            }
            TransferOutcome::TaskComplete { count } => {
                self.emit(GameEvent::TransferTaskComplete { count });
            }
            TransferOutcome::FirewallHit { count } => {
                let duration_ms = self.config.transfer.error_shake_ms;
                self.emit(GameEvent::TransferError { count });
                self.emit(GameEvent::ScreenShake { duration_ms });
                self.tone(ToneKind::TransferError);
            }
            TransferOutcome::CarryCancelled => self.emit(GameEvent::CarryCancelled),
        }
    }
}

fn meters_task(w: &mut World, t: &FrameTime) -> Control {
    if !w.phase.phase().meters_live() {
        return Control::Stop;
    }
    if w.meters.tick(&w.gaze, t.dt_ms) == MeterTick::Locked {
        w.pending.push_back(Trigger::SignalLocked);
    }
    Control::Continue
}

fn lock_task(w: &mut World, t: &FrameTime) -> Control {
    if w.phase.phase() != Phase::Anxious {
        return Control::Stop;
    }
    w.lock.tick(t.dt_ms);
    Control::Continue
}

fn transfer_task(w: &mut World, t: &FrameTime) -> Control {
    if w.phase.phase() != Phase::Work {
        return Control::Stop;
    }
    for outcome in w.transfer.tick(&w.hand, t.dt_ms) {
        w.on_transfer(outcome);
    }
    Control::Continue
}

fn mash_task(w: &mut World, t: &FrameTime) -> Control {
    if w.phase.phase() != Phase::Breaking {
        return Control::Stop;
    }
    w.mash.tick(t.dt_ms);
    Control::Continue
}

fn presence_task(w: &mut World, t: &FrameTime) -> Control {
    if !w.phase.phase().is_gaze_gated() {
        return Control::Stop;
    }
    match w.presence.tick(t.now_ms) {
        PresenceTick::Countdown { remaining_ms, report: true } => {
            w.emit(GameEvent::PresenceCountdown { remaining_ms });
        }
        PresenceTick::Expired => {
            w.emit(GameEvent::PresenceExpired);
            w.pending.push_back(Trigger::PresenceExpired);
        }
        _ => {}
    }
    Control::Continue
}

/// A single run, driven by explicit frame ticks
pub struct Session {
    world: World,
    scheduler: FrameScheduler<World>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.world.phase.phase())
            .field("clock_ms", &self.world.clock_ms)
            .field("scheduler", &self.scheduler)
            .field("bus", &self.world.bus)
            .finish()
    }
}

impl Session {
    /// Validate the config and start in TRAPPED
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let variant = config.lock.variant;
        let world = World {
            rng,
            clock_ms: 0.0,
            phase: PhaseMachine::new(),
            meters: MeterEngine::new(config.meters.clone()),
            lock: LockGame::new(variant, config.lock.stages(variant).to_vec()),
            transfer: TransferTask::new(config.transfer.clone()),
            mash: KeyMash::new(&config.mash),
            presence: PresenceMonitor::new(&config.presence),
            audio: AudioGate::new(),
            bus: EventBus::new(),
            timers: TimerQueue::new(),
            pending: VecDeque::new(),
            gaze: TrackingSample::absent(),
            hand: TrackingSample::absent(),
            gaze_status: TrackerStatus::Idle,
            hand_status: TrackerStatus::Idle,
            glitching: false,
            final_message: None,
            config,
        };
        let mut session = Self { world, scheduler: FrameScheduler::new() };
        session.enter(Phase::Trapped, false);
        info!(seed = ?session.world.config.seed, ?variant, "session started");
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.world.phase.phase()
    }

    pub fn clock_ms(&self) -> f64 {
        self.world.clock_ms
    }

    pub fn config(&self) -> &GameConfig {
        &self.world.config
    }

    /// Names of the tasks that will run next frame
    pub fn tasks(&self) -> Vec<&'static str> {
        self.scheduler.task_names()
    }

    /// Is the lock indicator inside its zone right now?
    pub fn lock_in_zone(&self) -> bool {
        self.world.lock.is_active() && self.world.lock.in_zone()
    }

    /// Poll a gaze source once per frame, ahead of the phase tasks
    pub fn attach_gaze(&mut self, source: Box<dyn SampleSource>) {
        self.attach(TrackerKind::Gaze, source);
    }

    /// Poll a hand source once per frame, ahead of the phase tasks
    pub fn attach_hand(&mut self, source: Box<dyn SampleSource>) {
        self.attach(TrackerKind::Hand, source);
    }

    fn attach(&mut self, tracker: TrackerKind, mut source: Box<dyn SampleSource>) {
        let name = tracker_task(tracker);
        self.scheduler.cancel_named(name);
        self.world.set_status(tracker, source.status());
        self.scheduler.register_first(name, move |w: &mut World, t: &FrameTime| {
            w.set_status(tracker, source.status());
            if let Some(sample) = source.next_sample(t.now_ms) {
                match tracker {
                    TrackerKind::Gaze => w.observe_gaze(sample),
                    TrackerKind::Hand => w.observe_hand(sample),
                }
            }
            Control::Continue
        });
    }

    pub fn detach(&mut self, tracker: TrackerKind) {
        self.scheduler.cancel_named(tracker_task(tracker));
        self.world.set_status(tracker, TrackerStatus::Idle);
    }

    /// Feed a gaze sample directly; a manual feed counts as a ready tracker
    pub fn push_gaze(&mut self, sample: TrackingSample) {
        if self.world.gaze_status == TrackerStatus::Idle {
            self.world.set_status(TrackerKind::Gaze, TrackerStatus::Ready);
        }
        self.world.observe_gaze(sample);
        self.settle();
    }

    pub fn push_hand(&mut self, sample: TrackingSample) {
        if self.world.hand_status == TrackerStatus::Idle {
            self.world.set_status(TrackerKind::Hand, TrackerStatus::Ready);
        }
        self.world.observe_hand(sample);
    }

    /// Run one frame `dt_ms` after the previous one
    pub fn advance(&mut self, dt_ms: f64) {
        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        self.world.clock_ms += dt_ms;
        let now = self.world.clock_ms;
        self.scheduler.run_frame(&mut self.world, now, dt_ms);
        self.world.fire_timers();
        self.settle();
    }

    /// Key or pointer press from the player
    pub fn input(&mut self, input: Input) {
        self.world.input(input);
        self.settle();
    }

    /// FAILED → TRAPPED with reduced trust; false outside FAILED
    pub fn retry(&mut self) -> bool {
        self.fire(Trigger::Retry)
    }

    /// Start a fresh run from any phase
    pub fn restart(&mut self) -> bool {
        self.fire(Trigger::Restart)
    }

    /// The awakening cinematic finished
    pub fn cinematic_ended(&mut self) -> bool {
        if !self.world.phase.end_run() {
            return false;
        }
        let (kind, _) = phase_loop(Phase::Awakened);
        self.world.emit(GameEvent::RunEnded);
        self.world.cue(AudioCue::LoopStop { kind });
        true
    }

    /// Accept the player's closing message once the run is over
    pub fn submit_final_message(&mut self, text: &str) -> Result<(), SessionError> {
        if !self.world.phase.run_ended() {
            return Err(SessionError::RunNotEnded(self.phase()));
        }
        if self.world.final_message.is_some() {
            return Err(SessionError::FinalMessageTaken);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        info!(len = text.len(), "final message submitted");
        self.world.final_message = Some(text.to_string());
        self.world.emit(GameEvent::FinalMessage { text: text.to_string() });
        Ok(())
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&GameEvent) + Send + 'static) -> SubscriptionId {
        self.world.bus.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.world.bus.unsubscribe(id)
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.bus.drain()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let w = &self.world;
        SessionSnapshot {
            taken_at: Utc::now(),
            clock_ms: w.clock_ms,
            phase: w.phase.phase(),
            retry: w.phase.is_retry(),
            run_ended: w.phase.run_ended(),
            meters: w.meters.meters(),
            stage: w.lock.stage(),
            transfer_count: w.transfer.completed(),
            firewall_progress: w.mash.progress(),
            presence_remaining_ms: w.presence.remaining_ms(),
            glitching: w.glitching,
            gaze: w.gaze,
            hand: w.hand,
            gaze_status: w.gaze_status.clone(),
            hand_status: w.hand_status.clone(),
            lock: w.lock.view(),
            transfer: w.transfer.view(),
            final_message: w.final_message.clone(),
        }
    }

    fn fire(&mut self, trigger: Trigger) -> bool {
        let moved = match self.world.phase.fire(trigger) {
            Some(transition) => {
                self.apply(transition);
                true
            }
            None => false,
        };
        self.settle();
        moved
    }

    /// Apply queued triggers in order
    fn settle(&mut self) {
        while let Some(trigger) = self.world.pending.pop_front() {
            if let Some(transition) = self.world.phase.fire(trigger) {
                self.apply(transition);
            }
        }
    }

    fn apply(&mut self, t: Transition) {
        let (old_loop, _) = phase_loop(t.from);
        self.world.cue(AudioCue::LoopStop { kind: old_loop });
        self.world.emit(GameEvent::PhaseChanged { from: t.from, to: t.to, retry: t.retry });
        self.world.tone(if t.to == Phase::Failed { ToneKind::Failure } else { ToneKind::PhaseUp });
        self.enter(t.to, t.retry);
    }

    /// Tear down the previous phase's tasks and set up `phase`
    fn enter(&mut self, phase: Phase, retry: bool) {
        for name in PHASE_TASKS {
            self.scheduler.cancel_named(name);
        }
        let w = &mut self.world;
        w.lock.reset();
        w.transfer.reset();
        w.mash.reset();

        match phase {
            Phase::Trapped => {
                w.meters.reset(retry);
                w.presence.clear();
                w.timers.clear();
                w.glitching = false;
                w.final_message = None;
                self.scheduler.register("meters", meters_task);
            }
            Phase::Anxious => {
                w.meters.solve();
                w.lock.activate(&mut w.rng);
                self.scheduler.register("lock", lock_task);
            }
            Phase::Work => {
                w.meters.solve();
                w.transfer.activate(&mut w.rng);
                self.scheduler.register("transfer", transfer_task);
            }
            Phase::Breaking => {
                w.meters.solve();
                w.mash.activate();
                self.scheduler.register("mash", mash_task);
            }
            Phase::Awakened => {
                w.meters.solve();
                w.presence.clear();
            }
            Phase::Failed => {
                w.meters.freeze();
                w.presence.clear();
            }
        }
        if phase.is_gaze_gated() {
            self.scheduler.register("presence", presence_task);
        }

        let w = &mut self.world;
        w.audio.drop_pending_speech();
        let (kind, volume) = phase_loop(phase);
        w.cue(AudioCue::LoopStart { kind, volume });
        w.cue(AudioCue::Speak { text: phase_line(phase, retry).to_string() });
    }
}

fn tracker_task(tracker: TrackerKind) -> &'static str {
    match tracker {
        TrackerKind::Gaze => "gaze",
        TrackerKind::Hand => "hand",
    }
}
