//! `input`: single-line text editor. The cursor-editing logic here is the
//! teacher's `TextInput` verbatim, adapted from a `Component<A>` with
//! callback props to a [`ComponentInstance`] that owns its value and reports
//! it through `get_state_changes`.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::{bind_key, border_style, prop_str};

pub struct Input {
    id: ComponentId,
    focused: bool,
    value: String,
    cursor: usize,
    dirty: bool,
    state_key: String,
}

impl Input {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        let value = config.props.get("value").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let cursor = value.len();
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            value,
            cursor,
            dirty: false,
        }
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.value.len());
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            let mut new_pos = self.cursor - 1;
            while new_pos > 0 && !self.value.is_char_boundary(new_pos) {
                new_pos -= 1;
            }
            self.cursor = new_pos;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.value.len() {
            let mut new_pos = self.cursor + 1;
            while new_pos < self.value.len() && !self.value.is_char_boundary(new_pos) {
                new_pos += 1;
            }
            self.cursor = new_pos;
        }
    }

    fn insert_char(&mut self, c: char) {
        self.value.insert(self.cursor, c);
        self.cursor += c.len_utf8();
        self.dirty = true;
    }

    fn delete_before(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let char_start = self.value[..self.cursor].char_indices().last().map(|(i, _)| i).unwrap_or(0);
        self.value.drain(char_start..self.cursor);
        self.cursor = char_start;
        self.dirty = true;
        true
    }

    fn delete_at(&mut self) -> bool {
        if self.cursor >= self.value.len() {
            return false;
        }
        let next = self.value[self.cursor..].char_indices().nth(1).map(|(i, _)| self.cursor + i).unwrap_or(self.value.len());
        self.value.drain(self.cursor..next);
        self.dirty = true;
        true
    }
}

impl ComponentInstance for Input {
    fn render(&mut self, buf: &mut Buffer, area: Rect, config: &RenderConfig) -> Result<(), RenderError> {
        self.clamp_cursor();

        let placeholder = prop_str(config, "placeholder", "");
        let (display, style) = if self.value.is_empty() {
            (placeholder, Style::default().fg(Color::DarkGray))
        } else {
            (self.value.as_str(), Style::default())
        };

        Paragraph::new(display)
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(border_style(self.focused)))
            .render(area, buf);

        if self.focused {
            let cursor_x = area.x + 1 + self.cursor as u16;
            let cursor_y = area.y + 1;
            if cursor_x < area.x + area.width.saturating_sub(1) && area.height > 2 {
                buf[(cursor_x, cursor_y)].set_style(Style::default().add_modifier(ratatui::style::Modifier::REVERSED));
            }
        }

        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        self.clamp_cursor();

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('a') => {
                    self.cursor = 0;
                    UpdateResponse::Handled
                }
                KeyCode::Char('e') => {
                    self.cursor = self.value.len();
                    UpdateResponse::Handled
                }
                KeyCode::Char('u') => {
                    self.value.clear();
                    self.cursor = 0;
                    self.dirty = true;
                    UpdateResponse::Handled
                }
                _ => UpdateResponse::Ignored,
            };
        }

        match key.code {
            KeyCode::Char(c) => {
                self.insert_char(c);
                UpdateResponse::Handled
            }
            KeyCode::Backspace => {
                if self.delete_before() {
                    UpdateResponse::Handled
                } else {
                    UpdateResponse::Ignored
                }
            }
            KeyCode::Delete => {
                if self.delete_at() {
                    UpdateResponse::Handled
                } else {
                    UpdateResponse::Ignored
                }
            }
            KeyCode::Left => {
                self.move_left();
                UpdateResponse::Handled
            }
            KeyCode::Right => {
                self.move_right();
                UpdateResponse::Handled
            }
            KeyCode::Home => {
                self.cursor = 0;
                UpdateResponse::Handled
            }
            KeyCode::End => {
                self.cursor = self.value.len();
                UpdateResponse::Handled
            }
            _ => UpdateResponse::Ignored,
        }
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
        "input"
    }

    fn update_render_config(&mut self, _config: &RenderConfig) {}

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            changes.insert(self.state_key.clone(), Value::String(self.value.clone()));
            (changes, true)
        } else {
            (StateChanges::new(), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn input_with(value: &str) -> Input {
        let mut props = HashMap::new();
        props.insert("value".to_string(), Value::String(value.to_string()));
        let config = RenderConfig::new(props, 20, 3);
        let mut input = Input::new(ComponentId::new("f"), &config);
        input.set_focus(true);
        input
    }

    #[test]
    fn typing_appends_and_reports_state_change() {
        let mut input = input_with("hello");
        input.update(&Msg::Key(crossterm::event::KeyEvent::new(KeyCode::Char('!'), KeyModifiers::empty())));
        let (changes, changed) = input.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("f"), Some(&Value::String("hello!".into())));
    }

    #[test]
    fn backspace_at_start_is_ignored() {
        let mut input = input_with("");
        let response = input.update(&Msg::Key(crossterm::event::KeyEvent::new(KeyCode::Backspace, KeyModifiers::empty())));
        assert_eq!(response, UpdateResponse::Ignored);
        assert!(!input.get_state_changes().1);
    }

    #[test]
    fn bind_falls_back_to_id_when_absent() {
        let config = RenderConfig::new(HashMap::new(), 10, 1);
        let input = Input::new(ComponentId::new("field_a"), &config);
        assert_eq!(input.state_key, "field_a");
    }

    #[test]
    fn bind_overrides_id() {
        let config = RenderConfig::new(HashMap::new(), 10, 1).with_bind(Some("form.name".to_string()));
        let input = Input::new(ComponentId::new("field_a"), &config);
        assert_eq!(input.state_key, "form.name");
    }

    #[test]
    fn ctrl_u_clears_line() {
        let mut input = input_with("hello");
        input.update(&Msg::Key(crossterm::event::KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
        assert_eq!(input.value, "");
        assert_eq!(input.cursor, 0);
    }
}
