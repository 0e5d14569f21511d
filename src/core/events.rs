//! Event bus: synchronous subscribers plus a drainable outbox

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::types::GameEvent;

/// Outbox entries kept when nobody drains
pub const OUTBOX_LIMIT: usize = 4096;

pub type Handler = Box<dyn FnMut(&GameEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(SubscriptionId, Handler)>,
    outbox: VecDeque<GameEvent>,
    next_id: u64,
    dropped: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .field("outbox", &self.outbox.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&GameEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        before != self.handlers.len()
    }

    /// Deliver to every subscriber, then queue for draining
    pub fn emit(&mut self, event: GameEvent) {
        trace!(code = event.code(), "event");
        for (_, handler) in self.handlers.iter_mut() {
            handler(&event);
        }
        if self.outbox.len() >= OUTBOX_LIMIT {
            self.outbox.pop_front();
            self.dropped += 1;
            if self.dropped == 1 {
                warn!(limit = OUTBOX_LIMIT, "event outbox full, dropping oldest");
            }
        }
        self.outbox.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.outbox.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscribers_see_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe(move |e| sink.lock().unwrap().push(e.code()));
        bus.emit(GameEvent::RunEnded);
        bus.emit(GameEvent::GlitchEnded);
        assert_eq!(*seen.lock().unwrap(), vec!["E002_RUN_ENDED", "E012_GLITCH_ENDED"]);
        assert_eq!(bus.drain().len(), 2);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = Arc::clone(&count);
        let id = bus.subscribe(move |_| *c.lock().unwrap() += 1);
        bus.emit(GameEvent::RunEnded);
        assert!(bus.unsubscribe(id));
        bus.emit(GameEvent::RunEnded);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_outbox_is_bounded() {
        let mut bus = EventBus::new();
        for _ in 0..OUTBOX_LIMIT + 10 {
            bus.emit(GameEvent::GlitchEnded);
        }
        assert_eq!(bus.pending(), OUTBOX_LIMIT);
    }
}
