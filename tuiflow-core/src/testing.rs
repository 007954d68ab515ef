//! Test utilities for applications built on tuiflow.
//!
//! - [`key`]/[`char_key`]/[`ctrl_key`]/[`alt_key`]: build `KeyEvent`s for
//!   driving a [`crate::dispatch::MessageDispatcher`] or a
//!   [`crate::component::ComponentInstance`] directly in a unit test.
//! - [`RecordingSink`]: a [`crate::host::MessageSink`] that appends to a
//!   `Vec<Msg>` instead of crossing a channel, for asserting on what a
//!   [`crate::host::HostApi`] call (or an action) enqueued.
//! - [`StateProbe`]: a thin assertion helper over a [`crate::state::StateStore`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;
use std::sync::Mutex;

use crate::host::MessageSink;
use crate::keybindings::parse_key_string;
use crate::msg::Msg;
use crate::state::StateStore;

/// Create a `KeyEvent` from a key string.
///
/// This is a convenience wrapper around [`parse_key_string`] that panics
/// if the key string is invalid, making it suitable for use in tests.
///
/// # Examples
///
/// ```
/// use tuiflow_core::testing::key;
/// use crossterm::event::{KeyCode, KeyModifiers};
///
/// let k = key("q");
/// assert_eq!(k.code, KeyCode::Char('q'));
///
/// let k = key("ctrl+p");
/// assert_eq!(k.code, KeyCode::Char('p'));
/// assert!(k.modifiers.contains(KeyModifiers::CONTROL));
///
/// let k = key("shift+tab");
/// assert_eq!(k.code, KeyCode::BackTab);
/// ```
///
/// # Panics
///
/// Panics if the key string cannot be parsed.
pub fn key(s: &str) -> KeyEvent {
    parse_key_string(s).unwrap_or_else(|| panic!("invalid key string: {s:?}"))
}

/// Create a `KeyEvent` for a character with no modifiers.
pub fn char_key(c: char) -> KeyEvent {
    KeyEvent {
        code: KeyCode::Char(c),
        modifiers: KeyModifiers::empty(),
        kind: crossterm::event::KeyEventKind::Press,
        state: crossterm::event::KeyEventState::empty(),
    }
}

/// Create a `KeyEvent` for a character with the Ctrl modifier.
pub fn ctrl_key(c: char) -> KeyEvent {
    KeyEvent {
        code: KeyCode::Char(c),
        modifiers: KeyModifiers::CONTROL,
        kind: crossterm::event::KeyEventKind::Press,
        state: crossterm::event::KeyEventState::empty(),
    }
}

/// Create a `KeyEvent` for a character with the Alt modifier.
pub fn alt_key(c: char) -> KeyEvent {
    KeyEvent {
        code: KeyCode::Char(c),
        modifiers: KeyModifiers::ALT,
        kind: crossterm::event::KeyEventKind::Press,
        state: crossterm::event::KeyEventState::empty(),
    }
}

/// A [`MessageSink`] that records every [`Msg`] pushed to it instead of
/// crossing the Bridge channel, for asserting on what a [`crate::host::HostApi`]
/// call or a dispatch result enqueued.
///
/// # Examples
///
/// ```
/// use tuiflow_core::testing::RecordingSink;
/// use tuiflow_core::{HostApi, Msg, StateStore};
///
/// let sink = RecordingSink::new();
/// let host = HostApi::new(sink.clone(), StateStore::new());
/// host.quit();
///
/// assert!(matches!(sink.drain()[..], [Msg::Quit]));
/// ```
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: std::sync::Arc<Mutex<Vec<Msg>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message sent so far, in order, and clears the log.
    pub fn drain(&self) -> Vec<Msg> {
        std::mem::take(&mut *self.sent.lock().expect("recording sink lock poisoned"))
    }

    /// True if any recorded message matched `predicate`, without draining.
    pub fn any(&self, predicate: impl Fn(&Msg) -> bool) -> bool {
        self.sent.lock().expect("recording sink lock poisoned").iter().any(predicate)
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, msg: Msg) {
        self.sent.lock().expect("recording sink lock poisoned").push(msg);
    }
}

/// Assertion helper over a [`StateStore`]: mostly exists so test bodies read
/// `state.expect_eq("count", 1)` instead of unwrapping `get`/`Value` by hand.
pub struct StateProbe<'a>(&'a StateStore);

impl<'a> StateProbe<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self(store)
    }

    pub fn expect_eq(&self, path: &str, expected: impl Into<Value>) {
        let (actual, _found) = self.0.get(path);
        let expected = expected.into();
        assert_eq!(
            actual,
            Some(expected.clone()),
            "expected state at `{path}` to be {expected:?}, got {actual:?}"
        );
    }

    pub fn expect_missing(&self, path: &str) {
        let (actual, found) = self.0.get(path);
        assert!(!found, "expected no state at `{path}`, found {actual:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostApi;

    #[test]
    fn key_simple() {
        let k = key("q");
        assert_eq!(k.code, KeyCode::Char('q'));
        assert_eq!(k.modifiers, KeyModifiers::empty());
    }

    #[test]
    fn key_with_ctrl() {
        let k = key("ctrl+p");
        assert_eq!(k.code, KeyCode::Char('p'));
        assert!(k.modifiers.contains(KeyModifiers::CONTROL));
    }

    #[test]
    fn key_special_names() {
        assert_eq!(key("esc").code, KeyCode::Esc);
        assert_eq!(key("enter").code, KeyCode::Enter);
        assert_eq!(key("shift+tab").code, KeyCode::BackTab);
    }

    #[test]
    fn char_key_has_no_modifiers() {
        let k = char_key('x');
        assert_eq!(k.code, KeyCode::Char('x'));
        assert_eq!(k.modifiers, KeyModifiers::empty());
    }

    #[test]
    fn ctrl_key_sets_control_modifier() {
        let k = ctrl_key('c');
        assert_eq!(k.code, KeyCode::Char('c'));
        assert!(k.modifiers.contains(KeyModifiers::CONTROL));
    }

    #[test]
    fn recording_sink_captures_host_api_calls() {
        let sink = RecordingSink::new();
        let host = HostApi::new(sink.clone(), StateStore::new());
        host.quit();
        host.clear_screen();

        let sent = sink.drain();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Msg::Quit));
        assert!(matches!(sent[1], Msg::Command(crate::effect::SessionEffect::ClearScreen)));

        // drain() clears the log.
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn state_probe_reports_mismatches() {
        let store = StateStore::new();
        store.set("count", Value::from(1));
        let probe = StateProbe::new(&store);
        probe.expect_eq("count", 1);
        probe.expect_missing("nope");
    }
}
