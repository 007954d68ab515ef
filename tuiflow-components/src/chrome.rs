//! Small helpers shared by every builtin component: border styling that
//! reflects focus, and the state key a `bind`-less node falls back to.

use ratatui::style::{Color, Style};

use tuiflow_core::{ComponentId, RenderConfig};

/// Cyan border when focused, dark gray otherwise — the teacher's
/// `TextInput`/`SelectList` convention, reused everywhere a builtin draws a
/// bordered box.
pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

/// The state key a component should write its value under: `config.bind` if
/// the node declared one, else the node's own id (§3 Node invariant).
pub fn bind_key(config: &RenderConfig, id: &ComponentId) -> String {
    config.bind.clone().unwrap_or_else(|| id.to_string())
}

/// Reads a string prop, falling back to `default` when absent or non-string.
pub fn prop_str<'a>(config: &'a RenderConfig, key: &str, default: &'a str) -> &'a str {
    config.props.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}
