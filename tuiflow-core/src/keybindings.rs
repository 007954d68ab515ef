//! Key-string grammar: parsing, display formatting, and the flat binding
//! table consulted by the Message Dispatcher's bubble phase.
//!
//! `parse_key_string`/`format_key_for_display` are carried over near
//! verbatim from the teacher: the spec's §6 "Key strings" grammar
//! (printable runes, `tab`/`shift+tab`/`enter`/`esc`/`ctrl+<char>`, arrow
//! keys, `f1..f12`) is exactly what these already parse. What's dropped is
//! the teacher's per-context `Keybindings<C>` generic — bindings here are a
//! single flat map from key string to [`ActionSpec`], since the engine has
//! no notion of a user-defined context enum, only one global bindings table
//! per configuration.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::ActionSpec;

/// The configuration's `bindings` map: key string → action.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings(HashMap<String, ActionSpec>);

impl KeyBindings {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key_str: impl Into<String>, action: ActionSpec) {
        self.0.insert(key_str.into(), action);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the action bound to a key event: first an exact key-string
    /// match, then (per §4.G) a single-rune fallback for character keys.
    pub fn lookup(&self, event: KeyEvent) -> Option<&ActionSpec> {
        for (key_str, action) in &self.0 {
            if let Some(parsed) = parse_key_string(key_str) {
                if keys_match(parsed, event) {
                    return Some(action);
                }
            }
        }

        if let KeyCode::Char(c) = event.code {
            if event.modifiers.is_empty() || event.modifiers == KeyModifiers::SHIFT {
                return self.0.get(&c.to_string());
            }
        }
        None
    }

    /// The default bindings the loader applies when a configuration omits
    /// (or partially specifies) `bindings`, per §6.
    pub fn defaults() -> Self {
        let mut b = Self::new();
        b.insert("q", ActionSpec::Process {
            name: "tui.quit".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("ctrl+c", ActionSpec::Process {
            name: "tui.quit".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("tab", ActionSpec::Process {
            name: "tui.focus.next".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("shift+tab", ActionSpec::Process {
            name: "tui.focus.prev".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("enter", ActionSpec::Process {
            name: "tui.form.submit".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("ctrl+r", ActionSpec::Process {
            name: "tui.refresh".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("ctrl+l", ActionSpec::Process {
            name: "tui.refresh".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b.insert("ctrl+z", ActionSpec::Process {
            name: "tui.suspend".into(),
            args: Default::default(),
            on_success: None,
            on_error: None,
        });
        b
    }

    /// Merge `user` on top of `defaults` — user entries win.
    pub fn merge(mut defaults: Self, user: Self) -> Self {
        for (key, action) in user.0 {
            defaults.0.insert(key, action);
        }
        defaults
    }
}

fn keys_match(parsed: KeyEvent, actual: KeyEvent) -> bool {
    let codes_match = match (parsed.code, actual.code) {
        (KeyCode::Char(a), KeyCode::Char(b)) => a.to_ascii_lowercase() == b.to_ascii_lowercase(),
        (a, b) => a == b,
    };
    codes_match && parsed.modifiers == actual.modifiers
}

/// Returns true for Tab / Shift-Tab / Esc — the keys that pre-empt a
/// focused component's `Handled` response per §4.G.
pub fn is_global_navigation_key(event: KeyEvent) -> bool {
    matches!(event.code, KeyCode::Tab | KeyCode::BackTab | KeyCode::Esc)
}

/// Parse a key string like "q", "esc", "ctrl+p", "shift+tab" into a KeyEvent.
pub fn parse_key_string(key_str: &str) -> Option<KeyEvent> {
    let key_str = key_str.trim().to_lowercase();

    if key_str.is_empty() {
        return None;
    }

    if key_str == "shift+tab" || key_str == "backtab" {
        return Some(KeyEvent {
            code: KeyCode::BackTab,
            modifiers: KeyModifiers::SHIFT,
            kind: crossterm::event::KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        });
    }

    let parts: Vec<&str> = key_str.split('+').collect();
    let mut modifiers = KeyModifiers::empty();
    let key_part = parts.last()?.trim();

    if parts.len() > 1 {
        for part in &parts[..parts.len() - 1] {
            match part.trim() {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                "alt" => modifiers |= KeyModifiers::ALT,
                _ => {}
            }
        }
    }

    let code = match key_part {
        "esc" | "escape" => KeyCode::Esc,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backtab" => {
            if modifiers.is_empty() {
                modifiers |= KeyModifiers::SHIFT;
            }
            KeyCode::BackTab
        }
        "backspace" => KeyCode::Backspace,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "delete" => KeyCode::Delete,
        "insert" => KeyCode::Insert,
        "f1" => KeyCode::F(1),
        "f2" => KeyCode::F(2),
        "f3" => KeyCode::F(3),
        "f4" => KeyCode::F(4),
        "f5" => KeyCode::F(5),
        "f6" => KeyCode::F(6),
        "f7" => KeyCode::F(7),
        "f8" => KeyCode::F(8),
        "f9" => KeyCode::F(9),
        "f10" => KeyCode::F(10),
        "f11" => KeyCode::F(11),
        "f12" => KeyCode::F(12),
        "space" => KeyCode::Char(' '),
        c if c.chars().count() == 1 => KeyCode::Char(c.chars().next()?),
        _ => return None,
    };

    Some(KeyEvent {
        code,
        modifiers,
        kind: crossterm::event::KeyEventKind::Press,
        state: crossterm::event::KeyEventState::empty(),
    })
}

/// Format a key string for display (e.g. "ctrl+p" -> "^P", "tab" -> "Tab").
pub fn format_key_for_display(key_str: &str) -> String {
    let key_str = key_str.trim().to_lowercase();

    if key_str == "shift+tab" || key_str == "backtab" {
        return "Shift+Tab".to_string();
    }

    let parts: Vec<&str> = key_str.split('+').collect();
    let mut modifiers = Vec::new();
    let key_part = parts.last().copied().unwrap_or(key_str.as_str());

    if parts.len() > 1 {
        for part in &parts[..parts.len() - 1] {
            match part.trim() {
                "ctrl" | "control" => modifiers.push("^"),
                "shift" => modifiers.push("Shift+"),
                "alt" => modifiers.push("Alt+"),
                _ => {}
            }
        }
    }

    let key_display = match key_part {
        "esc" | "escape" => "Esc".to_string(),
        "enter" | "return" => "Enter".to_string(),
        "tab" => "Tab".to_string(),
        "backspace" => "Backspace".to_string(),
        "up" => "Up".to_string(),
        "down" => "Down".to_string(),
        "left" => "Left".to_string(),
        "right" => "Right".to_string(),
        "home" => "Home".to_string(),
        "end" => "End".to_string(),
        "pageup" => "PgUp".to_string(),
        "pagedown" => "PgDn".to_string(),
        "delete" => "Del".to_string(),
        "insert" => "Ins".to_string(),
        "space" => "Space".to_string(),
        "f1" => "F1".to_string(),
        "f2" => "F2".to_string(),
        "f3" => "F3".to_string(),
        "f4" => "F4".to_string(),
        "f5" => "F5".to_string(),
        "f6" => "F6".to_string(),
        "f7" => "F7".to_string(),
        "f8" => "F8".to_string(),
        "f9" => "F9".to_string(),
        "f10" => "F10".to_string(),
        "f11" => "F11".to_string(),
        "f12" => "F12".to_string(),
        c if c.chars().count() == 1 => {
            let ch = c.chars().next().unwrap();
            if ch.is_alphabetic() {
                ch.to_uppercase().collect::<String>()
            } else {
                ch.to_string()
            }
        }
        _ => key_part.to_string(),
    };

    if modifiers.is_empty() {
        key_display
    } else {
        format!("{}{}", modifiers.join(""), key_display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_key() {
        let result = parse_key_string("q").unwrap();
        assert_eq!(result.code, KeyCode::Char('q'));
        assert_eq!(result.modifiers, KeyModifiers::empty());
    }

    #[test]
    fn parse_ctrl_key() {
        let result = parse_key_string("ctrl+p").unwrap();
        assert_eq!(result.code, KeyCode::Char('p'));
        assert!(result.modifiers.contains(KeyModifiers::CONTROL));
    }

    #[test]
    fn parse_shift_tab() {
        let result = parse_key_string("shift+tab").unwrap();
        assert_eq!(result.code, KeyCode::BackTab);
        assert!(result.modifiers.contains(KeyModifiers::SHIFT));
    }

    #[test]
    fn format_examples() {
        assert_eq!(format_key_for_display("q"), "Q");
        assert_eq!(format_key_for_display("ctrl+p"), "^P");
        assert_eq!(format_key_for_display("esc"), "Esc");
        assert_eq!(format_key_for_display("shift+tab"), "Shift+Tab");
    }

    #[test]
    fn defaults_cover_quit_and_focus() {
        let defaults = KeyBindings::defaults();
        let quit = defaults.lookup(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::empty(),
            kind: crossterm::event::KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        });
        assert!(matches!(quit, Some(ActionSpec::Process { name, .. }) if name == "tui.quit"));
    }

    #[test]
    fn user_overrides_default() {
        let mut user = KeyBindings::new();
        user.insert("q", ActionSpec::Payload(Default::default()));
        let merged = KeyBindings::merge(KeyBindings::defaults(), user);
        let bound = merged.lookup(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::empty(),
            kind: crossterm::event::KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        });
        assert!(matches!(bound, Some(ActionSpec::Payload(_))));
    }
}
