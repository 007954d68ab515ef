//! Configuration data model: the tree a session loads at startup.
//!
//! Parsing accepts plain JSON or the JSON-with-comments variant (`//` and
//! `/* */` comments, stripped ahead of `serde_json::from_str` — a small
//! hand-rolled pass rather than a second parser dependency, since nothing
//! else in the engine needs a jsonc-aware AST).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::keybindings::KeyBindings;

pub const MAX_LAYOUT_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Vertical,
    Horizontal,
    Column,
    Row,
}

impl Direction {
    /// Normalizes the four accepted spellings down to column/row.
    pub fn is_column(self) -> bool {
        matches!(self, Direction::Vertical | Direction::Column)
    }
}

/// A node's main-axis size: either a fixed cell count or a flex weight pair.
///
/// `basis` is the child's natural (pre-distribution) main-axis size — the
/// width/height it shrinks *from* when siblings overflow the container
/// (§4.D Phase 2). A flex child with no declared width has `basis: 0`, same
/// as before this field existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    Fixed(u16),
    Flex { basis: u16, grow: u16, shrink: u16 },
}

impl SizeSpec {
    pub fn is_flex(self) -> bool {
        matches!(self, SizeSpec::Flex { .. })
    }
}

impl Default for SizeSpec {
    fn default() -> Self {
        SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 }
    }
}

impl<'de> Deserialize<'de> for SizeSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        size_spec_from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn size_spec_from_value(value: &Value) -> Result<SizeSpec, String> {
    match value {
        Value::Number(n) => {
            let w = n.as_u64().ok_or_else(|| "size must be non-negative".to_string())?;
            Ok(SizeSpec::Fixed(w as u16))
        }
        Value::String(s) if s == "flex" => Ok(SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 }),
        Value::Object(map) => {
            // `width`/`height` inside a flex object is the declared natural
            // size (basis) a shrink weight shrinks from, e.g. "shrink=1
            // width=40" (§8 scenario 4); `basis` is accepted as an alias.
            let basis = map
                .get("width")
                .or_else(|| map.get("basis"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u16;
            let grow = map.get("grow").and_then(Value::as_u64).unwrap_or(1) as u16;
            let shrink = map.get("shrink").and_then(Value::as_u64).unwrap_or(1) as u16;
            Ok(SizeSpec::Flex { basis, grow, shrink })
        }
        other => Err(format!("invalid size spec: {other}")),
    }
}

impl Serialize for SizeSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SizeSpec::Fixed(w) => serializer.serialize_u16(*w),
            SizeSpec::Flex { basis, grow, shrink } => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("width", basis)?;
                map.serialize_entry("grow", grow)?;
                map.serialize_entry("shrink", shrink)?;
                map.end()
            }
        }
    }
}

/// Fixed inset in cells: [top, right, bottom, left].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Padding {
    #[serde(default)]
    pub top: u16,
    #[serde(default)]
    pub right: u16,
    #[serde(default)]
    pub bottom: u16,
    #[serde(default)]
    pub left: u16,
}

impl Padding {
    pub fn from_array(v: [u16; 4]) -> Self {
        Self {
            top: v[0],
            right: v[1],
            bottom: v[2],
            left: v[3],
        }
    }
}

/// A declarative action attached to a keystroke or component event.
///
/// Exactly one of `process`/`script`/`payload` is set, enforced at parse
/// time by the custom `Deserialize` impl below.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    Process {
        name: String,
        args: Vec<Value>,
        on_success: Option<String>,
        on_error: Option<String>,
    },
    Script {
        name: String,
        method: String,
        args: Vec<Value>,
        on_success: Option<String>,
        on_error: Option<String>,
    },
    Payload(HashMap<String, Value>),
}

#[derive(Debug, Deserialize)]
struct RawActionSpec {
    process: Option<String>,
    script: Option<String>,
    method: Option<String>,
    #[serde(default)]
    args: Vec<Value>,
    payload: Option<HashMap<String, Value>>,
    #[serde(rename = "onSuccess")]
    on_success: Option<String>,
    #[serde(rename = "onError")]
    on_error: Option<String>,
}

impl<'de> Deserialize<'de> for ActionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawActionSpec::deserialize(deserializer)?;
        let set_count = [raw.process.is_some(), raw.script.is_some(), raw.payload.is_some()]
            .into_iter()
            .filter(|b| *b)
            .count();
        if set_count != 1 {
            return Err(serde::de::Error::custom(
                "action must set exactly one of process, script, or payload",
            ));
        }
        if let Some(name) = raw.process {
            return Ok(ActionSpec::Process {
                name,
                args: raw.args,
                on_success: raw.on_success,
                on_error: raw.on_error,
            });
        }
        if let Some(name) = raw.script {
            return Ok(ActionSpec::Script {
                name,
                method: raw.method.unwrap_or_default(),
                args: raw.args,
                on_success: raw.on_success,
                on_error: raw.on_error,
            });
        }
        Ok(ActionSpec::Payload(raw.payload.unwrap_or_default()))
    }
}

/// A node in the layout tree.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    /// Stable id; generated deterministically if absent (§3 Node).
    pub id: Option<String>,
    /// Component type name for leaves; `None` for containers.
    #[serde(rename = "type")]
    pub component_type: Option<String>,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default)]
    pub width: SizeSpec,
    #[serde(default)]
    pub height: SizeSpec,
    #[serde(default)]
    pub padding: Padding,
    #[serde(default)]
    pub gap: u16,
    #[serde(default)]
    pub border: bool,
    #[serde(default)]
    pub props: HashMap<String, Value>,
    pub bind: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

fn default_direction() -> Direction {
    Direction::Column
}

impl Node {
    pub fn is_container(&self) -> bool {
        self.component_type.is_none()
    }
}

/// The root configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub id: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    pub layout: Node,
    #[serde(rename = "onLoad")]
    pub on_load: Option<ActionSpec>,
    #[serde(default)]
    pub bindings: HashMap<String, ActionSpec>,
    #[serde(rename = "autoFocus", default = "default_true")]
    pub auto_focus: bool,
    #[serde(rename = "tabCycles", default = "default_true")]
    pub tab_cycles: bool,
    #[serde(rename = "logLevel")]
    pub log_level: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Configuration {
    /// Parse a configuration document, accepting the JSON-with-comments
    /// variant (`.tui.jsonc`).
    pub fn load_from_str(source: &str) -> Result<Self, ConfigError> {
        let stripped = strip_jsonc_comments(source);
        let config: Configuration = serde_json::from_str(&stripped)?;
        config.validate()?;
        Ok(config)
    }

    pub fn key_bindings(&self) -> KeyBindings {
        let mut user = KeyBindings::new();
        for (key_str, action) in &self.bindings {
            user.insert(key_str.clone(), action.clone());
        }
        KeyBindings::merge(KeyBindings::defaults(), user)
    }

    /// Flattens nested `data` so `{user:{name:"A"}}` is also addressable as
    /// `user.name`, per §3 State Store.
    pub fn flatten_initial_state(&self) -> HashMap<String, Value> {
        let mut flat = HashMap::new();
        for (key, value) in &self.data {
            flatten_into(key, value, &mut flat);
        }
        flat
    }

    /// Collects every validation failure rather than bailing on the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ConfigError::EmptyName.to_string());
        }

        validate_node(&self.layout, 0, &mut errors);

        let known_keys = self.flatten_initial_state();
        warn_on_missing_binds(&self.layout, &known_keys);

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            // Preserve the specific variant when there's exactly one failure.
            if self.name.trim().is_empty() && errors.len() == 1 {
                Err(ConfigError::EmptyName)
            } else {
                Err(ConfigError::Multiple(1, errors.remove(0)))
            }
        } else {
            Err(ConfigError::Multiple(errors.len(), errors.join("; ")))
        }
    }
}

fn validate_node(node: &Node, depth: usize, errors: &mut Vec<String>) {
    if depth > MAX_LAYOUT_DEPTH {
        errors.push(ConfigError::DepthExceeded { max: MAX_LAYOUT_DEPTH }.to_string());
        return;
    }
    if let Some(ty) = &node.component_type {
        if !crate::component::is_known_type(ty) {
            errors.push(ConfigError::UnknownComponentType(ty.clone()).to_string());
        }
    }
    for child in &node.children {
        validate_node(child, depth + 1, errors);
    }
}

/// `bind` referencing a key absent from the initial `data` is a warning, not
/// a validation failure (§3 Configuration invariant) — the key may still be
/// populated later by an action or a script before anything reads it.
fn warn_on_missing_binds(node: &Node, known_keys: &HashMap<String, Value>) {
    if let Some(bind) = &node.bind {
        if !known_keys.contains_key(bind) {
            tracing::warn!(bind = %bind, node_id = ?node.id, "bind references a key absent from initial state");
        }
    }
    for child in &node.children {
        warn_on_missing_binds(child, known_keys);
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut HashMap<String, Value>) {
    out.insert(prefix.to_string(), value.clone());
    if let Value::Object(map) = value {
        for (key, nested) in map {
            let path = format!("{prefix}.{key}");
            flatten_into(&path, nested, out);
        }
    }
}

/// Strips `//` line comments and `/* */` block comments outside of string
/// literals, so the result is plain JSON that `serde_json` accepts.
fn strip_jsonc_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some((_, c)) = chars.next() {
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                chars.next();
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = ' ';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let src = r#"{
            // a comment
            "name": "demo", /* inline */
            "layout": { "type": "text", "props": {} }
        }"#;
        let stripped = strip_jsonc_comments(src);
        let parsed: Configuration = serde_json::from_str(&stripped).unwrap();
        assert_eq!(parsed.name, "demo");
    }

    #[test]
    fn comment_markers_inside_strings_are_preserved() {
        let src = r#"{"name": "http://example.com", "layout": {"type": "text", "props": {}}}"#;
        let stripped = strip_jsonc_comments(src);
        assert!(stripped.contains("http://example.com"));
    }

    #[test]
    fn flattens_nested_data() {
        let src = r#"{
            "name": "demo",
            "data": {"user": {"name": "A"}},
            "layout": {"type": "text", "props": {}}
        }"#;
        let config = Configuration::load_from_str(src).unwrap();
        let flat = config.flatten_initial_state();
        assert_eq!(flat.get("user.name").unwrap(), "A");
        assert!(flat.contains_key("user"));
    }

    #[test]
    fn rejects_empty_name() {
        let src = r#"{"name": "", "layout": {"type": "text", "props": {}}}"#;
        let err = Configuration::load_from_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName));
    }

    #[test]
    fn rejects_unknown_component_type() {
        let src = r#"{"name": "demo", "layout": {"type": "not-a-real-type", "props": {}}}"#;
        let err = Configuration::load_from_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::Multiple(1, _)));
    }

    #[test]
    fn action_spec_requires_exactly_one_variant() {
        let src = r#"{"process": "tui.quit", "payload": {"a": 1}}"#;
        let err = serde_json::from_str::<ActionSpec>(src).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn bind_to_missing_key_is_a_warning_not_a_failure() {
        let src = r#"{
            "name": "demo",
            "data": {"count": 0},
            "layout": {"type": "input", "id": "username", "bind": "username", "props": {}}
        }"#;
        // Must still load successfully; the missing `username` key is only
        // ever a logged warning.
        assert!(Configuration::load_from_str(src).is_ok());
    }

    #[test]
    fn default_bindings_applied_when_omitted() {
        let src = r#"{"name": "demo", "layout": {"type": "text", "props": {}}}"#;
        let config = Configuration::load_from_str(src).unwrap();
        let bindings = config.key_bindings();
        assert!(!bindings.is_empty());
    }
}
