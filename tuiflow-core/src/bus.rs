//! Event Bus: publish/subscribe keyed by action name, per §4.I.
//!
//! Distinct from the Message Dispatcher in [`crate::dispatch`] — this bus
//! carries `tui.*`/host-published *application* events (`focus.changed`,
//! `form.submitted`, whatever a [`crate::config::ActionSpec::Payload`]
//! names), not raw input. Delivery is synchronous and runs subscribers in
//! registration order, so a handler that publishes another event sees it
//! queued rather than re-entering the bus mid-dispatch.

use std::collections::HashMap;

use serde_json::Value;

/// A subscriber callback: receives the optional payload published alongside
/// the event.
pub type Subscriber = Box<dyn FnMut(Option<&Value>) + Send>;

/// Synchronous, action-name-keyed publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<String, Vec<Subscriber>>,
    queue: Vec<(String, Option<Value>)>,
    draining: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `action`. Multiple subscribers to the same
    /// name are all invoked, in the order they were registered.
    pub fn subscribe(&mut self, action: impl Into<String>, handler: Subscriber) {
        self.subscribers.entry(action.into()).or_default().push(handler);
    }

    pub fn subscriber_count(&self, action: &str) -> usize {
        self.subscribers.get(action).map(|v| v.len()).unwrap_or(0)
    }

    /// Publishes `action` with an optional payload. A publish made from
    /// inside a subscriber is queued and drained after the current publish
    /// finishes, so handlers never observe reentrant delivery.
    pub fn publish(&mut self, action: impl Into<String>, payload: Option<Value>) {
        self.queue.push((action.into(), payload));
        if self.draining {
            return;
        }
        self.draining = true;
        while !self.queue.is_empty() {
            let (action, payload) = self.queue.remove(0);
            if let Some(handlers) = self.subscribers.get_mut(&action) {
                for handler in handlers.iter_mut() {
                    handler(payload.as_ref());
                }
            }
        }
        self.draining = false;
    }
}
