use std::collections::VecDeque;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::{input::events::MapEvent, prelude::HashMap, traits::EventSink};

/// Forwards events over a crossbeam channel
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: Sender<MapEvent>,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver that drains it
    pub fn channel() -> (Self, Receiver<MapEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: MapEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("event receiver dropped; discarding event");
        }
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: MapEvent) {}
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&MapEvent) + Send + Sync>;

#[derive(Default)]
struct EventManagerState {
    /// Event listeners by event name
    listeners: HashMap<String, Vec<EventCallback>>,
    event_queue: VecDeque<MapEvent>,
}

/// Queues events and fans them out to listeners by name.
///
/// Emitting only queues; listeners run when the host calls
/// [`EventManager::process_events`] on its own thread.
#[derive(Default)]
pub struct EventManager {
    state: Mutex<EventManagerState>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for events named `event_name` (e.g. `onMapReady`)
    pub fn on<F>(&self, event_name: &str, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.state
            .lock()
            .listeners
            .entry(event_name.to_string())
            .or_default()
            .push(Box::new(callback));
    }

    /// Process all queued events
    pub fn process_events(&self) -> Vec<MapEvent> {
        let mut state = self.state.lock();
        let events: Vec<_> = state.event_queue.drain(..).collect();

        for event in &events {
            if let Some(callbacks) = state.listeners.get(event.name()) {
                for callback in callbacks {
                    callback(event);
                }
            }
        }

        events
    }

    /// Clear all events from the queue
    pub fn clear_events(&self) {
        self.state.lock().event_queue.clear();
    }

    /// Get number of pending events
    pub fn pending_events(&self) -> usize {
        self.state.lock().event_queue.len()
    }
}

impl EventSink for EventManager {
    fn emit(&self, event: MapEvent) {
        self.state.lock().event_queue.push_back(event);
    }
}
