//! Declarative effects returned alongside a dispatch's changed-flag.
//!
//! Kept from the teacher's effect-aware store vocabulary
//! ([`DispatchResult<E>`]): a reducer-shaped function returns whether state
//! changed *and* a list of effects to perform, rather than performing them
//! inline. The dispatcher and action executor both return
//! `DispatchResult<SessionEffect>`; the session loop is the single place
//! that interprets `SessionEffect` against the terminal driver.

/// Side effects the session loop must carry out after a dispatch cycle.
/// These are exactly the operations the Host API surface (§4.J) exposes to
/// scripts, expressed as data so the dispatcher and action executor can
/// both emit them without depending on the terminal driver directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    Refresh,
    Quit,
    Interrupt,
    Suspend,
    ClearScreen,
    EnterAltScreen,
    ExitAltScreen,
    ShowCursor,
    HideCursor,
    FocusNext,
    FocusPrev,
    SetFocus(String),
    SubmitForm,
    PublishEvent { action: String, data: Option<serde_json::Value> },
}

/// Result of dispatching a message or action.
///
/// Contains both the state-change indicator and any effects to be
/// processed by the session loop after the dispatch returns.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult<E = SessionEffect> {
    /// Whether state was modified; governs whether a re-render is needed.
    pub changed: bool,
    /// Effects to be processed after dispatch.
    pub effects: Vec<E>,
}

impl<E> Default for DispatchResult<E> {
    fn default() -> Self {
        Self::unchanged()
    }
}

impl<E> DispatchResult<E> {
    #[inline]
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            effects: vec![],
        }
    }

    #[inline]
    pub fn changed() -> Self {
        Self {
            changed: true,
            effects: vec![],
        }
    }

    #[inline]
    pub fn effect(effect: E) -> Self {
        Self {
            changed: false,
            effects: vec![effect],
        }
    }

    #[inline]
    pub fn effects(effects: Vec<E>) -> Self {
        Self {
            changed: false,
            effects,
        }
    }

    #[inline]
    pub fn changed_with(effect: E) -> Self {
        Self {
            changed: true,
            effects: vec![effect],
        }
    }

    #[inline]
    pub fn changed_with_many(effects: Vec<E>) -> Self {
        Self {
            changed: true,
            effects,
        }
    }

    #[inline]
    pub fn with(mut self, effect: E) -> Self {
        self.effects.push(effect);
        self
    }

    #[inline]
    pub fn mark_changed(mut self) -> Self {
        self.changed = true;
        self
    }

    #[inline]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Fold another result into this one: OR the changed flags, append effects.
    pub fn merge(&mut self, other: DispatchResult<E>) {
        self.changed |= other.changed;
        self.effects.extend(other.effects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        let r: DispatchResult<SessionEffect> = DispatchResult::unchanged();
        assert!(!r.changed);
        assert!(r.effects.is_empty());

        let r = DispatchResult::changed_with(SessionEffect::Quit);
        assert!(r.changed);
        assert_eq!(r.effects, vec![SessionEffect::Quit]);
    }

    #[test]
    fn merge_ors_changed_and_appends_effects() {
        let mut a = DispatchResult::changed();
        let b = DispatchResult::effect(SessionEffect::Refresh);
        a.merge(b);
        assert!(a.changed);
        assert_eq!(a.effects, vec![SessionEffect::Refresh]);
    }

    #[test]
    fn chaining() {
        let r: DispatchResult<SessionEffect> = DispatchResult::unchanged()
            .with(SessionEffect::Refresh)
            .mark_changed();
        assert!(r.changed);
        assert_eq!(r.effects, vec![SessionEffect::Refresh]);
    }
}
