//! `form`: a small multi-field editor. `props.fields` is an array of
//! `{"key": ..., "label": ..., "value": ...}`; Tab/Shift+Tab cycles which
//! field is being edited, Enter reports the whole field map with a
//! `_submitted` marker so a binding can react to submission.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use serde_json::{Map, Value};

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::bind_key;

struct Field {
    key: String,
    label: String,
    value: String,
}

pub struct Form {
    id: ComponentId,
    focused: bool,
    fields: Vec<Field>,
    active: usize,
    cursor: usize,
    dirty: bool,
    state_key: String,
}

impl Form {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        let fields = read_fields(config);
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            fields,
            active: 0,
            cursor: 0,
            dirty: false,
        }
    }

    fn active_value(&self) -> &str {
        self.fields.get(self.active).map(|f| f.value.as_str()).unwrap_or("")
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.active_value().len());
    }

    fn cycle(&mut self, backward: bool) {
        if self.fields.is_empty() {
            return;
        }
        self.active = if backward {
            (self.active + self.fields.len() - 1) % self.fields.len()
        } else {
            (self.active + 1) % self.fields.len()
        };
        self.cursor = self.active_value().len();
    }

    fn as_object(&self, submitted: bool) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            map.insert(field.key.clone(), Value::String(field.value.clone()));
        }
        if submitted {
            map.insert("_submitted".to_string(), Value::Bool(true));
        }
        Value::Object(map)
    }
}

fn read_fields(config: &RenderConfig) -> Vec<Field> {
    config
        .props
        .get("fields")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let obj = item.as_object()?;
                    let key = obj.get("key")?.as_str()?.to_string();
                    let label = obj.get("label").and_then(|v| v.as_str()).unwrap_or(&key).to_string();
                    let value = obj.get("value").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    Some(Field { key, label, value })
                })
                .collect()
        })
        .unwrap_or_default()
}

impl ComponentInstance for Form {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        self.clamp_cursor();
        let border_style = if self.focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };
        Block::default().borders(Borders::ALL).border_style(border_style).render(area, buf);

        let inner = Rect::new(area.x + 1, area.y + 1, area.width.saturating_sub(2), area.height.saturating_sub(2));
        for (row, field) in self.fields.iter().enumerate().take(inner.height as usize) {
            let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
            let is_active = self.focused && row == self.active;
            let style = if is_active { Style::default().fg(Color::Yellow) } else { Style::default() };
            let text = format!("{}: {}", field.label, field.value);
            Paragraph::new(text).style(style).render(line_area, buf);
        }
        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        if self.fields.is_empty() {
            return UpdateResponse::Ignored;
        }
        self.clamp_cursor();

        match key.code {
            KeyCode::Tab if !key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.cycle(false);
                UpdateResponse::Handled
            }
            KeyCode::BackTab => {
                self.cycle(true);
                UpdateResponse::Handled
            }
            KeyCode::Char(c) => {
                let cursor = self.cursor;
                if let Some(field) = self.fields.get_mut(self.active) {
                    field.value.insert(cursor, c);
                }
                self.cursor += c.len_utf8();
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return UpdateResponse::Ignored;
                }
                let cursor = self.cursor;
                let value = self.active_value().to_string();
                let char_start = value[..cursor].char_indices().last().map(|(i, _)| i).unwrap_or(0);
                if let Some(field) = self.fields.get_mut(self.active) {
                    field.value.drain(char_start..cursor);
                }
                self.cursor = char_start;
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Enter => {
                self.dirty = true;
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
        "form"
    }

    fn update_render_config(&mut self, _config: &RenderConfig) {}

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            changes.insert(self.state_key.clone(), self.as_object(true));
            (changes, true)
        } else {
            (StateChanges::new(), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn form_with_fields() -> Form {
        let mut props = HashMap::new();
        props.insert(
            "fields".to_string(),
            json!([{"key": "name", "label": "Name", "value": ""}, {"key": "email", "label": "Email", "value": ""}]),
        );
        let config = RenderConfig::new(props, 30, 5);
        let mut form = Form::new(ComponentId::new("signup"), &config);
        form.set_focus(true);
        form
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(crossterm::event::KeyEvent::new(code, crossterm::event::KeyModifiers::empty()))
    }

    #[test]
    fn typing_edits_active_field_only() {
        let mut form = form_with_fields();
        form.update(&key(KeyCode::Char('a')));
        assert_eq!(form.fields[0].value, "a");
        assert_eq!(form.fields[1].value, "");
    }

    #[test]
    fn tab_cycles_to_next_field() {
        let mut form = form_with_fields();
        form.update(&key(KeyCode::Tab));
        form.update(&key(KeyCode::Char('x')));
        assert_eq!(form.fields[0].value, "");
        assert_eq!(form.fields[1].value, "x");
    }

    #[test]
    fn enter_reports_submission() {
        let mut form = form_with_fields();
        form.update(&key(KeyCode::Char('a')));
        form.get_state_changes();
        form.update(&key(KeyCode::Enter));
        let (changes, changed) = form.get_state_changes();
        assert!(changed);
        let value = changes.get("signup").unwrap();
        assert_eq!(value.get("_submitted"), Some(&Value::Bool(true)));
        assert_eq!(value.get("name"), Some(&Value::String("a".into())));
    }
}
