//! Change notifications for views of a [`SelectionModel`](crate::SelectionModel).
//!
//! Listeners subscribe to one of three topics: `state` (every state
//! transition), `progress` (percent settled while a search runs) and
//! `selection` (the committed segments after every change). The model never
//! renders anything itself; the view reacts to these events.

use std::fmt;

use crate::types::{PolyLine, SelectionState};

/// Notification channel a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// [`SelectionEvent::State`].
    State,
    /// [`SelectionEvent::Progress`].
    Progress,
    /// [`SelectionEvent::Selection`].
    Selection,
}

impl Topic {
    /// The topic's property name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Progress => "progress",
            Self::Selection => "selection",
        }
    }
}

/// A change published by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The model entered a new state.
    State(SelectionState),
    /// Percentage (`0..=100`) of the running search's window settled.
    Progress(u8),
    /// The committed segments after a change.
    Selection(Vec<PolyLine>),
}

impl SelectionEvent {
    /// Topic this event is delivered on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::State(_) => Topic::State,
            Self::Progress(_) => Topic::Progress,
            Self::Selection(_) => Topic::Selection,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&SelectionEvent) + Send>;

/// Registry of listeners keyed by topic.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Topic, Listener)>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` for every event on `topic`.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        listener: impl FnMut(&SelectionEvent) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, topic, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _, _)| *other != id);
        self.listeners.len() != before
    }

    /// Whether anyone listens on `topic`.
    #[must_use]
    pub fn has_listeners(&self, topic: Topic) -> bool {
        self.listeners.iter().any(|(_, t, _)| *t == topic)
    }

    /// Deliver `event` to the listeners of its topic, in subscription order.
    pub fn publish(&mut self, event: &SelectionEvent) {
        let topic = event.topic();
        for (_, _, listener) in self.listeners.iter_mut().filter(|(_, t, _)| *t == topic) {
            listener(event);
        }
    }

    /// Build and publish an event only if its topic has listeners.
    pub fn publish_with(&mut self, topic: Topic, event: impl FnOnce() -> SelectionEvent) {
        if self.has_listeners(topic) {
            let event = event();
            debug_assert_eq!(event.topic(), topic);
            self.publish(&event);
        }
    }
}
