//! Typed lifecycle events and the observer list that delivers them

use crate::types::ActorId;
use catalog_core::ConditionId;
use std::fmt;

/// Something the turn lifecycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    TurnStarted {
        actor_id: ActorId,
        actions_lost: u32,
    },
    TurnEnded {
        actor_id: ActorId,
        trauma_taken: u32,
        resilience_roll_needed: bool,
    },
    ConditionExpired {
        actor_id: ActorId,
        condition_id: ConditionId,
    },
    RoundAdvanced {
        round: u32,
        expired: usize,
    },
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&LifecycleEvent)>;

/// Synchronous observer list; listeners run in subscription order
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&LifecycleEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &LifecycleEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_listeners_run_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Rc::clone(&seen);
        bus.subscribe(move |_| first.borrow_mut().push("first"));
        let second = Rc::clone(&seen);
        bus.subscribe(move |_| second.borrow_mut().push("second"));

        bus.emit(&LifecycleEvent::RoundAdvanced {
            round: 1,
            expired: 0,
        });
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();

        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());

        bus.emit(&LifecycleEvent::RoundAdvanced {
            round: 1,
            expired: 0,
        });
        assert_eq!(*count.borrow(), 0);
    }
}
