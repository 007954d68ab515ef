//! Host API Surface: the handle exposed to scripts, per §4.J.
//!
//! Every method funnels through the same bounded channel ("Bridge", §5) that
//! carries native terminal events, so a script-initiated mutation is
//! indistinguishable from one the user typed once it reaches the session
//! loop — no separate code path, no separate locking discipline.

use serde_json::Value;

use crate::effect::SessionEffect;
use crate::msg::{ComponentId, Msg};

/// Enqueues a [`Msg`] onto the session's Bridge. `Session::host_api` wires
/// this to the same `mpsc::Sender` the terminal driver writes into.
pub trait MessageSink: Send + Sync {
    fn send(&self, msg: Msg);
}

/// The opaque handle a [`crate::action_exec::ScriptHost`] implementation
/// gives to script code. Cloning is cheap — it's a thin wrapper over a
/// channel sender plus a read-only snapshot accessor.
#[derive(Clone)]
pub struct HostApi<S: MessageSink + Clone> {
    sink: S,
    state: crate::state::StateStore,
}

impl<S: MessageSink + Clone> HostApi<S> {
    pub fn new(sink: S, state: crate::state::StateStore) -> Self {
        Self { sink, state }
    }

    /// Reads a state key without going through the message queue — a script
    /// calling `get_state` mid-execution sees the current committed value.
    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.state.get(key).0
    }

    /// Direct, synchronous write — bypasses the Bridge since state writes
    /// are already serialized by the State Store's own lock.
    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        self.state.set(key, value);
    }

    pub fn update_state(&self, values: impl IntoIterator<Item = (String, Value)>) {
        self.state.batch(values);
    }

    /// Submits a result message as if an Action Executor had produced it.
    pub fn execute_action(&self, state_key: impl Into<String>, value: Result<Value, String>) {
        self.sink.send(Msg::ActionResult { state_key: state_key.into(), value });
    }

    pub fn refresh(&self) {
        self.sink.send(Msg::StateRefresh);
    }

    pub fn quit(&self) {
        self.sink.send(Msg::Quit);
    }

    pub fn interrupt(&self) {
        self.sink.send(Msg::Command(SessionEffect::Interrupt));
    }

    pub fn suspend(&self) {
        self.sink.send(Msg::Command(SessionEffect::Suspend));
    }

    pub fn clear_screen(&self) {
        self.sink.send(Msg::Command(SessionEffect::ClearScreen));
    }

    pub fn enter_alt_screen(&self) {
        self.sink.send(Msg::Command(SessionEffect::EnterAltScreen));
    }

    pub fn exit_alt_screen(&self) {
        self.sink.send(Msg::Command(SessionEffect::ExitAltScreen));
    }

    pub fn show_cursor(&self) {
        self.sink.send(Msg::Command(SessionEffect::ShowCursor));
    }

    pub fn hide_cursor(&self) {
        self.sink.send(Msg::Command(SessionEffect::HideCursor));
    }

    /// Moves focus to the next focusable node in geometric order. `target`
    /// is accepted per §4.J's signature but the engine only ever has one
    /// focus coordinate (§4.F), so it is advisory only: the request always
    /// advances from whichever node currently holds focus.
    pub fn focus_next_input(&self, _target: Option<ComponentId>) {
        self.sink.send(Msg::Command(SessionEffect::FocusNext));
    }

    pub fn submit_form(&self) {
        self.sink.send(Msg::Command(SessionEffect::SubmitForm));
    }

    /// Publishes an application event (see [`crate::bus::EventBus`]) via a
    /// synthesized payload action, letting the dispatcher's normal action
    /// execution path carry it through rather than poking the bus directly
    /// from a non-loop thread.
    pub fn publish_event(&self, action: impl Into<String>, data: Option<Value>) {
        let mut payload = std::collections::HashMap::new();
        payload.insert("__event".to_string(), Value::String(action.into()));
        if let Some(data) = data {
            payload.insert("data".to_string(), data);
        }
        self.sink.send(Msg::ActionResult {
            state_key: "__published_event".to_string(),
            value: Ok(Value::Object(payload.into_iter().collect())),
        });
    }

    pub fn set_focus(&self, id: impl Into<ComponentId>) {
        self.sink.send(Msg::FocusChanged { id: id.into(), focused: true });
    }

    /// Sends `inner` to exactly `target`, bypassing the focus check.
    pub fn send_to(&self, target: impl Into<ComponentId>, inner: Msg) {
        self.sink.send(Msg::targeted(target.into(), inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl MessageSink for RecordingSink {
        fn send(&self, msg: Msg) {
            self.0.lock().unwrap().push(format!("{msg:?}"));
        }
    }

    #[test]
    fn get_state_reads_without_enqueueing() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let state = crate::state::StateStore::new();
        state.set("count", Value::from(1));
        let host = HostApi::new(RecordingSink(sent.clone()), state);
        assert_eq!(host.get_state("count"), Some(Value::from(1)));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn quit_enqueues_quit_message() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let state = crate::state::StateStore::new();
        let host = HostApi::new(RecordingSink(sent.clone()), state);
        host.quit();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn set_state_is_synchronous() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let state = crate::state::StateStore::new();
        let host = HostApi::new(RecordingSink(sent.clone()), state.clone());
        host.set_state("x", Value::from(42));
        assert_eq!(state.get("x").0, Some(Value::from(42)));
    }
}
