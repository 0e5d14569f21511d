//! Frame scheduler and cancelable timers
//!
//! Each looping subsystem is a named task ticked once per frame. A task
//! returns `Control::Stop` to drop out; the check happens at the top of every
//! tick, so a task whose phase has ended never runs its body again. Tests
//! drive frames with explicit times instead of a display loop.

use tracing::debug;

/// Time of the frame being run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    pub now_ms: f64,
    pub dt_ms: f64,
    pub frame: u64,
}

/// Whether a task wants another frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// A per-frame task over shared state `S`
pub trait Tickable<S>: Send {
    fn tick(&mut self, state: &mut S, time: &FrameTime) -> Control;
}

impl<S, F> Tickable<S> for F
where
    F: FnMut(&mut S, &FrameTime) -> Control + Send,
{
    fn tick(&mut self, state: &mut S, time: &FrameTime) -> Control {
        self(state, time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

struct Task<S> {
    id: TaskId,
    name: &'static str,
    body: Box<dyn Tickable<S>>,
}

/// Runs registered tasks in registration order, once per frame
pub struct FrameScheduler<S> {
    tasks: Vec<Task<S>>,
    next_id: u64,
    frame: u64,
}

impl<S> Default for FrameScheduler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for FrameScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("tasks", &self.task_names())
            .field("frame", &self.frame)
            .finish()
    }
}

impl<S> FrameScheduler<S> {
    pub fn new() -> Self {
        Self { tasks: Vec::new(), next_id: 0, frame: 0 }
    }

    pub fn register(&mut self, name: &'static str, body: impl Tickable<S> + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        debug!(task = name, "task registered");
        self.tasks.push(Task { id, name, body: Box::new(body) });
        id
    }

    /// Register ahead of every existing task (producers before consumers)
    pub fn register_first(&mut self, name: &'static str, body: impl Tickable<S> + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        debug!(task = name, "task registered first");
        self.tasks.insert(0, Task { id, name, body: Box::new(body) });
        id
    }

    /// Register unless a task with this name is already running
    pub fn ensure(&mut self, name: &'static str, body: impl Tickable<S> + 'static) -> Option<TaskId> {
        if self.is_running(name) {
            return None;
        }
        Some(self.register(name, body))
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    /// Cancel every task with this name; returns how many were dropped
    pub fn cancel_named(&mut self, name: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.name != name);
        before - self.tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Tick every task once; tasks that return `Stop` are removed
    pub fn run_frame(&mut self, state: &mut S, now_ms: f64, dt_ms: f64) -> FrameTime {
        self.frame += 1;
        let time = FrameTime { now_ms, dt_ms: dt_ms.max(0.0), frame: self.frame };
        self.tasks.retain_mut(|task| match task.body.tick(state, &time) {
            Control::Continue => true,
            Control::Stop => {
                debug!(task = task.name, frame = time.frame, "task stopped");
                false
            }
        });
        time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<A> {
    id: TimerId,
    due_ms: f64,
    action: A,
}

/// One-shot timers carrying an action payload
#[derive(Debug, Clone)]
pub struct TimerQueue<A> {
    timers: Vec<Timer<A>>,
    next_id: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self { timers: Vec::new(), next_id: 0 }
    }

    pub fn schedule(&mut self, now_ms: f64, after_ms: f64, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer { id, due_ms: now_ms + after_ms.max(0.0), action });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    /// Cancel timers whose action matches
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&A) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| !pred(&t.action));
        before - self.timers.len()
    }

    /// Remove and return due actions, earliest first
    pub fn pop_due(&mut self, now_ms: f64) -> Vec<A> {
        let mut due = Vec::new();
        let mut pending = Vec::with_capacity(self.timers.len());
        for timer in self.timers.drain(..) {
            if timer.due_ms <= now_ms {
                due.push(timer);
            } else {
                pending.push(timer);
            }
        }
        self.timers = pending;
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.id.0.cmp(&b.id.0)));
        due.into_iter().map(|t| t.action).collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
