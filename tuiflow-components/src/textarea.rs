//! `textarea`: multi-line editor. Shares `input`'s byte-boundary-aware
//! editing primitives but tracks a scroll offset and treats `Enter` as a
//! newline rather than a submit.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::{bind_key, border_style, prop_str};

pub struct TextArea {
    id: ComponentId,
    focused: bool,
    value: String,
    cursor: usize,
    scroll: usize,
    dirty: bool,
    state_key: String,
}

impl TextArea {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        let value = config.props.get("value").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let cursor = value.len();
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            value,
            cursor,
            scroll: 0,
            dirty: false,
        }
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.value.len());
    }

    fn cursor_line(&self) -> usize {
        self.value[..self.cursor].matches('\n').count()
    }

    fn line_bounds(&self, line: usize) -> (usize, usize) {
        let mut start = 0;
        for (i, part) in self.value.split('\n').enumerate() {
            let end = start + part.len();
            if i == line {
                return (start, end);
            }
            start = end + 1;
        }
        (self.value.len(), self.value.len())
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

    fn move_up(&mut self) {
        let line = self.cursor_line();
        if line == 0 {
            return;
        }
        let (cur_start, _) = self.line_bounds(line);
        let col = self.cursor - cur_start;
        let (prev_start, prev_end) = self.line_bounds(line - 1);
        self.cursor = (prev_start + col).min(prev_end);
    }

    fn move_down(&mut self) {
        let line = self.cursor_line();
        let total_lines = self.value.matches('\n').count() + 1;
        if line + 1 >= total_lines {
            return;
        }
        let (cur_start, _) = self.line_bounds(line);
        let col = self.cursor - cur_start;
        let (next_start, next_end) = self.line_bounds(line + 1);
        self.cursor = (next_start + col).min(next_end);
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 {
            return;
        }
        let line = self.cursor_line();
        if line < self.scroll {
            self.scroll = line;
        } else if line >= self.scroll + viewport_height {
            self.scroll = line + 1 - viewport_height;
        }
    }
}

impl ComponentInstance for TextArea {
    fn render(&mut self, buf: &mut Buffer, area: Rect, config: &RenderConfig) -> Result<(), RenderError> {
        self.clamp_cursor();
        let viewport_height = area.height.saturating_sub(2) as usize;
        self.ensure_visible(viewport_height);

        let placeholder = prop_str(config, "placeholder", "");
        let (display, style) = if self.value.is_empty() {
            (placeholder, Style::default().fg(Color::DarkGray))
        } else {
            (self.value.as_str(), Style::default())
        };

        let lines: Vec<&str> = display.lines().skip(self.scroll).collect();
        Paragraph::new(lines.join("\n"))
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(border_style(self.focused)))
            .render(area, buf);

        if self.focused && !self.value.is_empty() {
            let line = self.cursor_line();
            let (line_start, _) = self.line_bounds(line);
            let col = self.cursor - line_start;
            let cursor_y = area.y + 1 + (line - self.scroll) as u16;
            let cursor_x = area.x + 1 + col as u16;
            if cursor_y < area.y + area.height.saturating_sub(1) && cursor_x < area.x + area.width.saturating_sub(1) {
                buf[(cursor_x, cursor_y)].set_style(Style::default().add_modifier(ratatui::style::Modifier::REVERSED));
            }
        }

        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        self.clamp_cursor();

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('u') {
            self.value.clear();
            self.cursor = 0;
            self.dirty = true;
            return UpdateResponse::Handled;
        }

        match key.code {
            KeyCode::Char(c) => {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Enter => {
                self.value.insert(self.cursor, '\n');
                self.cursor += 1;
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    UpdateResponse::Ignored
                } else {
                    let char_start = self.value[..self.cursor].char_indices().last().map(|(i, _)| i).unwrap_or(0);
                    self.value.drain(char_start..self.cursor);
                    self.cursor = char_start;
                    self.dirty = true;
                    UpdateResponse::Handled
                }
            }
            KeyCode::Delete => {
                if self.cursor >= self.value.len() {
                    UpdateResponse::Ignored
                } else {
                    let next =
                        self.value[self.cursor..].char_indices().nth(1).map(|(i, _)| self.cursor + i).unwrap_or(self.value.len());
                    self.value.drain(self.cursor..next);
                    self.dirty = true;
                    UpdateResponse::Handled
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
            KeyCode::Up => {
                self.move_up();
                UpdateResponse::Handled
            }
            KeyCode::Down => {
                self.move_down();
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
        "textarea"
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

    fn area_with(value: &str) -> TextArea {
        let mut props = HashMap::new();
        props.insert("value".to_string(), Value::String(value.to_string()));
        let config = RenderConfig::new(props, 20, 5);
        let mut ta = TextArea::new(ComponentId::new("notes"), &config);
        ta.set_focus(true);
        ta
    }

    #[test]
    fn enter_inserts_newline() {
        let mut ta = area_with("abc");
        ta.update(&Msg::Key(crossterm::event::KeyEvent::new(KeyCode::Enter, KeyModifiers::empty())));
        assert_eq!(ta.value, "abc\n");
    }

    #[test]
    fn up_down_preserve_column() {
        let mut ta = area_with("ab\ncd");
        ta.cursor = 4; // after 'c' on second line
        ta.move_up();
        assert_eq!(ta.cursor, 1); // column 1 on first line ("ab")
        ta.move_down();
        assert_eq!(ta.cursor, 4);
    }

    #[test]
    fn reports_state_change_after_edit() {
        let mut ta = area_with("");
        ta.update(&Msg::Key(crossterm::event::KeyEvent::new(KeyCode::Char('x'), KeyModifiers::empty())));
        let (changes, changed) = ta.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("notes"), Some(&Value::String("x".into())));
    }
}
