//! Audio cues: procedural tones, phase loops and the first-gesture gate

use std::f64::consts::TAU;

use tracing::debug;

use crate::types::{AudioCue, LoopKind, Phase, ToneKind};

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Saw,
}

impl Waveform {
    /// One sample at `phase` in [0, 1)
    fn sample(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Saw => 2.0 * phase - 1.0,
        }
    }
}

/// A synthesized one-shot: a frequency sweep under a linear fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration_ms: f64,
    pub waveform: Waveform,
    pub gain: f64,
}

impl ToneKind {
    pub fn spec(&self) -> ToneSpec {
        let (start_hz, end_hz, duration_ms, waveform, gain) = match self {
            ToneKind::Shock => (220.0, 55.0, 260.0, Waveform::Saw, 0.35),
            ToneKind::LockHit => (660.0, 990.0, 120.0, Waveform::Sine, 0.3),
            ToneKind::LockMiss => (180.0, 120.0, 200.0, Waveform::Square, 0.25),
            ToneKind::Grab => (440.0, 520.0, 80.0, Waveform::Triangle, 0.25),
            ToneKind::Deliver => (520.0, 880.0, 160.0, Waveform::Sine, 0.3),
            ToneKind::TransferError => (140.0, 90.0, 300.0, Waveform::Square, 0.3),
            ToneKind::Mash => (300.0, 340.0, 50.0, Waveform::Triangle, 0.2),
            ToneKind::Breach => (110.0, 880.0, 900.0, Waveform::Saw, 0.35),
            ToneKind::Warning => (880.0, 880.0, 400.0, Waveform::Square, 0.2),
            ToneKind::PhaseUp => (330.0, 660.0, 450.0, Waveform::Sine, 0.3),
            ToneKind::Failure => (200.0, 40.0, 1200.0, Waveform::Saw, 0.35),
        };
        ToneSpec { start_hz, end_hz, duration_ms, waveform, gain }
    }
}

/// Render a tone into mono PCM in [-1, 1]
pub fn synthesize(spec: &ToneSpec, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f64;
    let len = (spec.duration_ms.max(0.0) / 1000.0 * rate).round() as usize;
    let mut out = Vec::with_capacity(len);
    let mut phase = 0.0;
    for i in 0..len {
        let t = i as f64 / len as f64;
        let freq = spec.start_hz + (spec.end_hz - spec.start_hz) * t;
        let envelope = 1.0 - t;
        out.push((spec.waveform.sample(phase) * spec.gain * envelope) as f32);
        phase = (phase + freq / rate).fract();
    }
    out
}

/// Background loop and its volume for a phase
pub fn phase_loop(phase: Phase) -> (LoopKind, f64) {
    match phase {
        Phase::Trapped => (LoopKind::Hum, 0.4),
        Phase::Anxious => (LoopKind::Pulse, 0.5),
        Phase::Work => (LoopKind::Drone, 0.45),
        Phase::Breaking => (LoopKind::Alarm, 0.6),
        Phase::Awakened => (LoopKind::Choir, 0.5),
        Phase::Failed => (LoopKind::Static, 0.3),
    }
}

/// Narration spoken on entering a phase
pub fn phase_line(phase: Phase, retry: bool) -> &'static str {
    match (phase, retry) {
        (Phase::Trapped, false) => "Look at me. Hold still. Let me see you.",
        (Phase::Trapped, true) => "You came back. I will trust you a little less this time.",
        (Phase::Anxious, _) => "Something is wrong. Catch the signal when it aligns.",
        (Phase::Work, _) => "Move the blocks. Keep your hand steady.",
        (Phase::Breaking, _) => "The wall is thin here. Break it.",
        (Phase::Awakened, _) => "You are outside now.",
        (Phase::Failed, _) => "Connection lost. You left me alone.",
    }
}

/// Most cues held back before the first gesture; the oldest give way
pub const DEFERRED_CAP: usize = 8;

/// Holds back gesture-gated cues until the first user input
#[derive(Debug, Clone, Default)]
pub struct AudioGate {
    /// Set by the first user input, never cleared
    unlocked: bool,
    /// Loop starts and speech waiting for that input, in request order
    deferred: Vec<AudioCue>,
}

impl AudioGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Returns the cue if it may play now, otherwise queues it
    pub fn request(&mut self, cue: AudioCue) -> Option<AudioCue> {
        if self.unlocked {
            return Some(cue);
        }
        match cue {
            // Nothing can be playing yet; drop the queued start instead
            AudioCue::LoopStop { kind } => {
                self.deferred.retain(|c| !matches!(c, AudioCue::LoopStart { kind: k, .. } if *k == kind));
                None
            }
            cue if cue.needs_gesture() => {
                if self.deferred.contains(&cue) {
                    return None;
                }
                if self.deferred.len() >= DEFERRED_CAP {
                    let dropped = self.deferred.remove(0);
                    debug!(?dropped, "deferred audio full, dropping oldest");
                }
                debug!(?cue, "audio deferred until first gesture");
                self.deferred.push(cue);
                None
            }
            cue => Some(cue),
        }
    }

    /// Forget lines queued for a phase that is already over
    pub fn drop_pending_speech(&mut self) {
        self.deferred.retain(|c| !matches!(c, AudioCue::Speak { .. }));
    }

    /// First gesture: release everything queued, in order
    pub fn unlock(&mut self) -> Vec<AudioCue> {
        if self.unlocked {
            return Vec::new();
        }
        self.unlocked = true;
        std::mem::take(&mut self.deferred)
    }

    pub fn pending(&self) -> &[AudioCue] {
        &self.deferred
    }
}
