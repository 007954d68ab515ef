//! Message types that flow through the dispatcher.
//!
//! Replaces the teacher's `event.rs`: instead of a fixed `EventType` enum
//! keyed to a generic `ComponentId` type parameter, the engine has exactly
//! one concrete id type (string ids are what configs declare and what
//! `comp_<type>_<counter>` generates) and exactly one message enum that
//! both terminal events and internal synthesized events travel through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossterm::event::{KeyEvent, MouseEvent};
use serde_json::Value;

use crate::effect::SessionEffect;

/// Stable identifier for a component instance.
///
/// Cheap to clone (an `Arc<str>` under the hood) since ids are threaded
/// through the dispatcher, focus manager, and subscription table on every
/// message.
#[derive(Clone, Eq)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Deterministic id for a node that did not declare one explicitly.
    pub fn generated(component_type: &str, counter: u64) -> Self {
        Self::new(format!("comp_{component_type}_{counter}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for ComponentId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The message types a component (or the dispatcher) may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    Key,
    Mouse,
    Resize,
    Tick,
    Focus,
    StateRefresh,
    Command,
}

/// A message delivered to the dispatcher or to a component instance.
#[derive(Debug, Clone)]
pub enum Msg {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Published by the Focus Manager whenever focus changes.
    FocusChanged { id: ComponentId, focused: bool },
    /// A state write happened; dispatcher should schedule a re-render.
    StateRefresh,
    /// Wrapper published by scripts/actions: bypasses the focus check and
    /// is delivered to exactly `target` regardless of `currentFocus`.
    Targeted {
        target: ComponentId,
        inner: Box<Msg>,
    },
    /// A process/script/payload action completed; the result (or error)
    /// should be written into state under `state_key`.
    ActionResult {
        state_key: String,
        value: Result<Value, String>,
    },
    /// A [`SessionEffect`] requested directly by the Host API (§4.J), e.g.
    /// `enter_alt_screen`/`hide_cursor`/`suspend`. Routed through the same
    /// Bridge as native input so a script-initiated command is handled by
    /// exactly the same capture-phase path as a key binding's action.
    Command(SessionEffect),
    Quit,
}

impl Msg {
    pub fn kind(&self) -> MsgKind {
        match self {
            Msg::Key(_) => MsgKind::Key,
            Msg::Mouse(_) => MsgKind::Mouse,
            Msg::Resize(_, _) => MsgKind::Resize,
            Msg::Tick => MsgKind::Tick,
            Msg::FocusChanged { .. } => MsgKind::Focus,
            Msg::StateRefresh => MsgKind::StateRefresh,
            Msg::Targeted { inner, .. } => inner.kind(),
            Msg::ActionResult { .. } => MsgKind::StateRefresh,
            Msg::Command(_) => MsgKind::Command,
            Msg::Quit => MsgKind::Key,
        }
    }

    /// System-level messages that the capture phase handles unconditionally
    /// are global: every subscriber sees them regardless of subscription
    /// filters falling back to "deliver to all".
    pub fn is_global(&self) -> bool {
        matches!(self, Msg::Resize(_, _) | Msg::Quit | Msg::Command(_))
    }

    pub fn targeted(target: ComponentId, inner: Msg) -> Msg {
        Msg::Targeted {
            target,
            inner: Box::new(inner),
        }
    }
}

/// A component instance's answer to `update(msg)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResponse {
    /// The message was consumed; stop routing (subject to global nav keys).
    Handled,
    /// The message was not relevant to this instance.
    Ignored,
    /// The instance handled part of the message but wants the dispatcher
    /// to continue with its own click-routing (mouse-only escape hatch).
    PassClick,
}

/// State changes an instance reports after handling a message, merged into
/// the State Store by the dispatcher's post-dispatch state-sync step.
pub type StateChanges = HashMap<String, Value>;
