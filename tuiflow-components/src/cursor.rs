//! `cursor`: a movable highlighted cell over a `cols`×`rows` grid — the
//! focusable primitive a spreadsheet- or board-style layout binds to when it
//! needs a single selectable position rather than a list or a text value.

use crossterm::event::KeyCode;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Widget};
use serde_json::{json, Value};

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::{bind_key, border_style};

pub struct Cursor {
    id: ComponentId,
    focused: bool,
    cols: u16,
    rows: u16,
    x: u16,
    y: u16,
    dirty: bool,
    state_key: String,
}

impl Cursor {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        let cols = prop_u16(config, "cols", 1);
        let rows = prop_u16(config, "rows", 1);
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            cols,
            rows,
            x: 0,
            y: 0,
            dirty: false,
        }
    }
}

fn prop_u16(config: &RenderConfig, key: &str, default: u16) -> u16 {
    config.props.get(key).and_then(|v| v.as_u64()).map(|n| n as u16).unwrap_or(default).max(1)
}

impl ComponentInstance for Cursor {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        Block::default().borders(Borders::ALL).border_style(border_style(self.focused)).render(area, buf);

        let inner = Rect::new(
            area.x + 1,
            area.y + 1,
            area.width.saturating_sub(2),
            area.height.saturating_sub(2),
        );
        if inner.width == 0 || inner.height == 0 {
            return Ok(());
        }

        let cell_w = (inner.width / self.cols).max(1);
        let cell_h = (inner.height / self.rows).max(1);
        let cx = inner.x + self.x * cell_w;
        let cy = inner.y + self.y * cell_h;
        if cx < inner.x + inner.width && cy < inner.y + inner.height {
            let style = if self.focused {
                Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD)
            } else {
                Style::default().bg(Color::DarkGray)
            };
            buf[(cx, cy)].set_style(style);
        }
        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        match key.code {
            KeyCode::Left | KeyCode::Char('h') if self.x > 0 => {
                self.x -= 1;
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Right | KeyCode::Char('l') if self.x + 1 < self.cols => {
                self.x += 1;
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Up | KeyCode::Char('k') if self.y > 0 => {
                self.y -= 1;
                self.dirty = true;
                UpdateResponse::Handled
            }
            KeyCode::Down | KeyCode::Char('j') if self.y + 1 < self.rows => {
                self.y += 1;
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
        "cursor"
    }

    fn update_render_config(&mut self, config: &RenderConfig) {
        self.cols = prop_u16(config, "cols", self.cols);
        self.rows = prop_u16(config, "rows", self.rows);
        self.x = self.x.min(self.cols.saturating_sub(1));
        self.y = self.y.min(self.rows.saturating_sub(1));
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            changes.insert(self.state_key.clone(), json!({"x": self.x, "y": self.y}));
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

    fn grid(cols: u64, rows: u64) -> Cursor {
        let mut props = HashMap::new();
        props.insert("cols".to_string(), Value::from(cols));
        props.insert("rows".to_string(), Value::from(rows));
        let config = RenderConfig::new(props, 10, 10);
        let mut cursor = Cursor::new(ComponentId::new("grid"), &config);
        cursor.set_focus(true);
        cursor
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(crossterm::event::KeyEvent::new(code, crossterm::event::KeyModifiers::empty()))
    }

    #[test]
    fn clamps_at_grid_edges() {
        let mut cursor = grid(2, 2);
        assert_eq!(cursor.update(&key(KeyCode::Left)), UpdateResponse::Ignored);
        cursor.update(&key(KeyCode::Right));
        assert_eq!(cursor.x, 1);
        assert_eq!(cursor.update(&key(KeyCode::Right)), UpdateResponse::Ignored);
    }

    #[test]
    fn reports_position_after_move() {
        let mut cursor = grid(3, 3);
        cursor.update(&key(KeyCode::Down));
        let (changes, changed) = cursor.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("grid"), Some(&json!({"x": 0, "y": 1})));
    }
}
