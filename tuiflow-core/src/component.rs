//! Component capability set and the two registries that compose over it.
//!
//! The Factory Registry is a static, name-keyed table of constructors set up
//! once at session wiring time; the Instance Registry is the per-session
//! cache that guarantees a component's internal view-state (caret position,
//! scroll offset, validation errors) survives across re-renders, per §4.C.
//! `is_known_type`/`is_focusable` are free functions rather than registry
//! methods: config validation needs to check a type name before any
//! registry exists.

use std::collections::HashMap;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use serde_json::Value;

use crate::error::RenderError;
use crate::msg::{ComponentId, Msg, MsgKind, StateChanges, UpdateResponse};

/// Types in the focusable closed set (§4.C). Anything outside this set
/// cannot receive focus or appear in Tab-cycle order.
pub const FOCUSABLE_TYPES: &[&str] = &[
    "input", "textarea", "menu", "form", "table", "crud", "chat", "list", "cursor",
];

/// Non-focusable leaf types shipped with the engine.
pub const NON_FOCUSABLE_TYPES: &[&str] = &["text"];

pub fn is_focusable(type_name: &str) -> bool {
    FOCUSABLE_TYPES.contains(&type_name)
}

pub fn is_known_type(type_name: &str) -> bool {
    FOCUSABLE_TYPES.contains(&type_name) || NON_FOCUSABLE_TYPES.contains(&type_name)
}

/// Resolved props plus the box the layout solver measured for this node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub props: HashMap<String, Value>,
    pub width: u16,
    pub height: u16,
    /// The node's `bind` key, if declared: the state key a focusable
    /// instance's `get_state_changes()` should write its current value
    /// under. Falls back to the node's own id when absent (§3 Node).
    pub bind: Option<String>,
}

impl RenderConfig {
    pub fn new(props: HashMap<String, Value>, width: u16, height: u16) -> Self {
        Self { props, width, height, bind: None }
    }

    pub fn with_bind(mut self, bind: Option<String>) -> Self {
        self.bind = bind;
        self
    }
}

/// The per-type behavior a config-driven node binds to. Mirrors §6's
/// "Factory interface" capability set; `init`/`cleanup`/
/// `get_subscribed_message_types`/`get_state_changes` have default no-op
/// implementations since most leaf components need none of them.
pub trait ComponentInstance: Send {
    fn init(&mut self) {}

    /// Draws into `area` of `buf`. Errors are substituted with a styled
    /// placeholder by the Renderer rather than aborting the frame.
    fn render(&mut self, buf: &mut Buffer, area: Rect, config: &RenderConfig) -> Result<(), RenderError>;

    fn update(&mut self, msg: &Msg) -> UpdateResponse;

    fn get_id(&self) -> &ComponentId;

    fn set_focus(&mut self, focused: bool);

    fn get_focus(&self) -> bool;

    fn get_component_type(&self) -> &'static str;

    fn update_render_config(&mut self, config: &RenderConfig);

    fn cleanup(&mut self) {}

    /// Empty means "deliver to all" — the broadcast fallback in §4.G.
    fn get_subscribed_message_types(&self) -> Vec<MsgKind> {
        Vec::new()
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        (StateChanges::new(), false)
    }
}

pub type FactoryFn =
    Box<dyn Fn(ComponentId, &RenderConfig) -> Box<dyn ComponentInstance> + Send + Sync>;

/// Static, name-keyed constructor table. Populated once at session wiring
/// time by whichever crate supplies concrete component implementations.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, FactoryFn>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, factory: FactoryFn) {
        self.factories.insert(type_name.into(), factory);
    }

    pub fn has(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    fn create(&self, type_name: &str, id: ComponentId, config: &RenderConfig) -> Option<Box<dyn ComponentInstance>> {
        self.factories.get(type_name).map(|f| f(id, config))
    }
}

struct Entry {
    instance: Box<dyn ComponentInstance>,
    component_type: String,
    last_config: RenderConfig,
}

/// Per-session cache of live component instances, keyed by node id.
///
/// The `get_or_create` contract is what makes the view-state survival
/// guarantee possible: a node whose `id`+`type` are unchanged across a
/// re-render gets its *existing* instance back, with only an
/// `update_render_config` call if props/size actually differ.
#[derive(Default)]
pub struct InstanceRegistry {
    entries: HashMap<ComponentId, Entry>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live instance for `id`, creating or recreating it as
    /// needed, plus whether it was freshly constructed this call.
    ///
    /// `None` means `factories` has no constructor registered for
    /// `type_name` — a session wiring bug, since config validation already
    /// confirmed the type name is in the known set.
    pub fn get_or_create(
        &mut self,
        id: ComponentId,
        type_name: &str,
        factories: &FactoryRegistry,
        config: RenderConfig,
    ) -> Option<(&mut Box<dyn ComponentInstance>, bool)> {
        let needs_recreate = match self.entries.get(&id) {
            Some(entry) => entry.component_type != type_name,
            None => false,
        };

        if needs_recreate {
            self.remove(&id);
        }

        let is_new = !self.entries.contains_key(&id);

        if is_new {
            let mut instance = factories.create(type_name, id.clone(), &config)?;
            instance.init();
            self.entries.insert(
                id.clone(),
                Entry {
                    instance,
                    component_type: type_name.to_string(),
                    last_config: config,
                },
            );
        } else if let Some(entry) = self.entries.get_mut(&id) {
            if entry.last_config != config {
                entry.instance.update_render_config(&config);
                entry.last_config = config;
            }
        }

        self.entries
            .get_mut(&id)
            .map(|entry| (&mut entry.instance, is_new))
    }

    pub fn get_mut(&mut self, id: &ComponentId) -> Option<&mut Box<dyn ComponentInstance>> {
        self.entries.get_mut(id).map(|entry| &mut entry.instance)
    }

    pub fn remove(&mut self, id: &ComponentId) {
        if let Some(mut entry) = self.entries.remove(id) {
            entry.instance.cleanup();
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cleanup_all(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            entry.instance.cleanup();
        }
    }

    /// Polls `get_state_changes()` on every live instance and merges
    /// whichever report changes into one map. Used by the `tui.form.submit`
    /// builtin to snapshot every bound input's current value into state in
    /// one pass (§4.H), rather than just the focused instance.
    pub fn snapshot_state_changes(&mut self) -> StateChanges {
        let mut merged = StateChanges::new();
        for entry in self.entries.values_mut() {
            let (changes, has_changes) = entry.instance.get_state_changes();
            if has_changes {
                merged.extend(changes);
            }
        }
        merged
    }
}
