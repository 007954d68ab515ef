//! Renderer: turns a solved [`LayoutNode`] tree into a drawn
//! `ratatui::buffer::Buffer`, per §4.E.
//!
//! Containers draw their own border/padding chrome and recurse; leaves
//! resolve `{{expr}}` props through the [`ExpressionCache`], hand the result
//! to the [`InstanceRegistry`], and fall back to a styled error placeholder
//! (plus an `__error_<id>` state key) rather than aborting the whole frame
//! when a single instance's `render` fails.

use std::collections::HashMap;

use ratatui::buffer::Buffer;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use serde_json::Value;

use crate::component::{FactoryRegistry, InstanceRegistry, RenderConfig};
use crate::expr::{ExpressionCache, FunctionTable};
use crate::layout::LayoutNode;
use crate::state::StateStore;

/// Draws `root` (and its whole subtree) into `buf`, returning the set of
/// `(id, error)` pairs recorded this frame so the caller can write
/// `__error_<id>` into the state store.
pub struct Renderer<'a> {
    factories: &'a FactoryRegistry,
    functions: &'a FunctionTable,
}

impl<'a> Renderer<'a> {
    pub fn new(factories: &'a FactoryRegistry, functions: &'a FunctionTable) -> Self {
        Self { factories, functions }
    }

    pub fn render(
        &self,
        root: &LayoutNode,
        buf: &mut Buffer,
        registry: &mut InstanceRegistry,
        state: &StateStore,
        cache: &ExpressionCache,
    ) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        self.render_node(root, buf, registry, state, cache, &mut errors);
        errors
    }

    fn render_node(
        &self,
        node: &LayoutNode,
        buf: &mut Buffer,
        registry: &mut InstanceRegistry,
        state: &StateStore,
        cache: &ExpressionCache,
        errors: &mut Vec<(String, String)>,
    ) {
        if node.node.border {
            Block::default().borders(Borders::ALL).render(node.area, buf);
        }

        match &node.component_type {
            Some(type_name) => self.render_leaf(node, type_name, buf, registry, state, cache, errors),
            None => {
                for child in &node.children {
                    self.render_node(child, buf, registry, state, cache, errors);
                }
            }
        }
    }

    fn render_leaf(
        &self,
        node: &LayoutNode,
        type_name: &str,
        buf: &mut Buffer,
        registry: &mut InstanceRegistry,
        state: &StateStore,
        cache: &ExpressionCache,
        errors: &mut Vec<(String, String)>,
    ) {
        let props = resolve_props(&node.node.props, state, cache, self.functions);
        let config = RenderConfig::new(props, node.area.width, node.area.height).with_bind(node.node.bind.clone());

        let Some((instance, _is_new)) =
            registry.get_or_create(node.id.clone(), type_name, self.factories, config.clone())
        else {
            render_error_placeholder(node.area, buf, "no factory registered for this type");
            errors.push((node.id.to_string(), format!("no factory registered for type `{type_name}`")));
            return;
        };

        if let Err(err) = instance.render(buf, node.area, &config) {
            render_error_placeholder(node.area, buf, &err.to_string());
            errors.push((node.id.to_string(), err.to_string()));
        }
    }
}

/// Walks the raw props map, replacing any string value containing `{{` with
/// its evaluated result; other scalars and nested containers are resolved
/// recursively so arrays/objects of strings also get expression support.
pub(crate) fn resolve_props(
    props: &HashMap<String, Value>,
    state: &StateStore,
    cache: &ExpressionCache,
    functions: &FunctionTable,
) -> HashMap<String, Value> {
    props
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, state, cache, functions)))
        .collect()
}

fn resolve_value(value: &Value, state: &StateStore, cache: &ExpressionCache, functions: &FunctionTable) -> Value {
    match value {
        Value::String(s) if s.contains("{{") => cache.resolve(s, state, functions),
        Value::Array(items) => Value::Array(
            items.iter().map(|v| resolve_value(v, state, cache, functions)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, state, cache, functions)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_error_placeholder(area: ratatui::layout::Rect, buf: &mut Buffer, message: &str) {
    let text = format!("render error: {message}");
    Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(Color::Red))
        .render(area, buf);
}

/// State keys recorded for a frame's render errors: `__error_<id>`.
pub fn error_state_patch(errors: &[(String, String)]) -> HashMap<String, Value> {
    errors
        .iter()
        .map(|(id, message)| (format!("__error_{id}"), Value::String(message.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInstance;
    use crate::config::{Direction, Node, Padding, SizeSpec};
    use crate::error::RenderError;
    use crate::msg::{ComponentId, Msg, UpdateResponse};
    use ratatui::layout::Rect;

    struct AlwaysFails;

    impl ComponentInstance for AlwaysFails {
        fn render(&mut self, _buf: &mut Buffer, _area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
            Err(RenderError::Instance {
                id: "boom".into(),
                source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "kaboom")),
            })
        }
        fn update(&mut self, _msg: &Msg) -> UpdateResponse {
            UpdateResponse::Ignored
        }
        fn get_id(&self) -> &ComponentId {
            static ID: std::sync::OnceLock<ComponentId> = std::sync::OnceLock::new();
            ID.get_or_init(|| ComponentId::new("boom"))
        }
        fn set_focus(&mut self, _focused: bool) {}
        fn get_focus(&self) -> bool {
            false
        }
        fn get_component_type(&self) -> &'static str {
            "fails"
        }
        fn update_render_config(&mut self, _config: &RenderConfig) {}
    }

    fn leaf(id: &str, type_name: &str, area: Rect) -> LayoutNode {
        LayoutNode {
            id: ComponentId::new(id.to_string()),
            component_type: Some(type_name.to_string()),
            area,
            node: Node {
                id: Some(id.to_string()),
                component_type: Some(type_name.to_string()),
                direction: Direction::Column,
                width: SizeSpec::Fixed(area.width),
                height: SizeSpec::Fixed(area.height),
                padding: Padding::default(),
                gap: 0,
                border: false,
                props: HashMap::new(),
                bind: None,
                children: Vec::new(),
            },
            children: Vec::new(),
        }
    }

    #[test]
    fn missing_factory_draws_placeholder_and_reports_error() {
        let factories = FactoryRegistry::new();
        let functions = FunctionTable::with_builtins();
        let renderer = Renderer::new(&factories, &functions);
        let mut registry = InstanceRegistry::new();
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let area = Rect::new(0, 0, 20, 3);
        let root = leaf("a", "nonexistent", area);
        let mut buf = Buffer::empty(area);

        let errors = renderer.render(&root, &mut buf, &mut registry, &state, &cache);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "a");
    }

    #[test]
    fn instance_render_error_is_captured_not_propagated() {
        let mut factories = FactoryRegistry::new();
        factories.register("fails", Box::new(|_id, _cfg| Box::new(AlwaysFails) as Box<dyn ComponentInstance>));
        let functions = FunctionTable::with_builtins();
        let renderer = Renderer::new(&factories, &functions);
        let mut registry = InstanceRegistry::new();
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let area = Rect::new(0, 0, 20, 3);
        let root = leaf("a", "fails", area);
        let mut buf = Buffer::empty(area);

        let errors = renderer.render(&root, &mut buf, &mut registry, &state, &cache);
        assert_eq!(errors.len(), 1);
        let patch = error_state_patch(&errors);
        assert!(patch.contains_key("__error_a"));
    }

    #[test]
    fn resolves_expr_props_against_state() {
        let state = StateStore::new();
        state.set("name", Value::String("Ada".into()));
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        let mut props = HashMap::new();
        props.insert("label".to_string(), Value::String("hello {{name}}".into()));
        let resolved = resolve_props(&props, &state, &cache, &functions);
        assert_eq!(resolved.get("label"), Some(&Value::String("hello Ada".into())));
    }
}
