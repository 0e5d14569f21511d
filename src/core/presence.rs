//! Presence monitor: fail the run when the face stays gone too long
//!
//! A face-lost edge opens a grace window when the monitor is armed. The
//! window reports its remaining time on a fixed cadence, is cancelled and
//! fully cleared by any re-detection, and expires exactly once.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::PresenceConfig;

/// Open grace window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceWindow {
    pub started_ms: f64,
    pub deadline_ms: f64,
    pub remaining_ms: f64,
}

/// A window was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceStart {
    /// First window since the warning latch was cleared
    pub warn: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresenceTick {
    Idle,
    Countdown { remaining_ms: f64, report: bool },
    Expired,
}

/// Grace-window watchdog over face detection
#[derive(Debug, Clone)]
pub struct PresenceMonitor {
    /// Window length
    grace_ms: f64,
    /// Countdown report cadence
    report_interval_ms: f64,
    /// Open window, if the face is currently gone
    window: Option<PresenceWindow>,
    /// Warning already given for this absence
    warned: bool,
    /// Clock value of the next countdown report
    next_report_ms: f64,
}

impl PresenceMonitor {
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            grace_ms: config.grace_ms,
            report_interval_ms: config.report_interval_ms,
            window: None,
            warned: false,
            next_report_ms: 0.0,
        }
    }

    pub fn window(&self) -> Option<PresenceWindow> {
        self.window
    }

    pub fn remaining_ms(&self) -> Option<f64> {
        self.window.map(|w| w.remaining_ms)
    }

    /// Face went from detected to absent
    pub fn face_lost(&mut self, now_ms: f64, armed: bool) -> Option<PresenceStart> {
        if !armed || self.window.is_some() {
            return None;
        }
        self.window = Some(PresenceWindow {
            started_ms: now_ms,
            deadline_ms: now_ms + self.grace_ms,
            remaining_ms: self.grace_ms,
        });
        self.next_report_ms = now_ms;
        let warn = !self.warned;
        self.warned = true;
        info!(grace_ms = self.grace_ms, "presence lost, grace window opened");
        Some(PresenceStart { warn })
    }

    /// Face detected again; true if a window was cancelled
    pub fn face_found(&mut self) -> bool {
        let cancelled = self.window.is_some();
        self.clear();
        if cancelled {
            debug!("presence restored, window cancelled");
        }
        cancelled
    }

    pub fn tick(&mut self, now_ms: f64) -> PresenceTick {
        let Some(window) = self.window.as_mut() else {
            return PresenceTick::Idle;
        };
        if now_ms - window.started_ms >= self.grace_ms {
            info!("presence grace expired");
            self.clear();
            return PresenceTick::Expired;
        }
        window.remaining_ms = (window.deadline_ms - now_ms).max(0.0);
        let remaining_ms = window.remaining_ms;
        let report = now_ms >= self.next_report_ms;
        if report {
            self.next_report_ms = now_ms + self.report_interval_ms;
        }
        PresenceTick::Countdown { remaining_ms, report }
    }

    /// Drop the window and both latches
    pub fn clear(&mut self) {
        self.window = None;
        self.warned = false;
        self.next_report_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PresenceMonitor {
        PresenceMonitor::new(&PresenceConfig::default())
    }

    #[test]
    fn test_unarmed_loss_opens_nothing() {
        let mut m = monitor();
        assert_eq!(m.face_lost(0.0, false), None);
        assert_eq!(m.tick(5000.0), PresenceTick::Idle);
    }

    #[test]
    fn test_expires_at_grace_not_before() {
        let mut m = monitor();
        assert_eq!(m.face_lost(1000.0, true), Some(PresenceStart { warn: true }));
        assert!(matches!(m.tick(3980.0), PresenceTick::Countdown { .. }));
        assert_eq!(m.tick(4020.0), PresenceTick::Expired);
        assert_eq!(m.window(), None);
        assert_eq!(m.tick(4040.0), PresenceTick::Idle);
    }

    #[test]
    fn test_second_loss_while_open_does_not_restart() {
        let mut m = monitor();
        m.face_lost(0.0, true);
        assert_eq!(m.face_lost(2000.0, true), None);
        assert_eq!(m.window().unwrap().started_ms, 0.0);
    }

    #[test]
    fn test_found_clears_and_next_loss_is_full_length() {
        let mut m = monitor();
        m.face_lost(0.0, true);
        m.tick(1000.0);
        assert!(m.face_found());
        assert!(!m.face_found());
        assert_eq!(m.tick(1100.0), PresenceTick::Idle);

        let start = m.face_lost(1500.0, true).unwrap();
        assert!(start.warn);
        match m.tick(1500.0) {
            PresenceTick::Countdown { remaining_ms, .. } => assert_eq!(remaining_ms, 3000.0),
            other => panic!("expected countdown, got {:?}", other),
        }
        assert!(matches!(m.tick(4400.0), PresenceTick::Countdown { .. }));
    }

    #[test]
    fn test_reports_follow_interval() {
        let mut m = monitor();
        m.face_lost(0.0, true);
        let mut reports = 0;
        let mut t = 0.0;
        while t < 1000.0 {
            if let PresenceTick::Countdown { report: true, .. } = m.tick(t) {
                reports += 1;
            }
            t += 20.0;
        }
        assert_eq!(reports, 10);
    }
}
