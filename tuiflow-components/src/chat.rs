//! `chat`: a scrollback of `props.messages` (array of strings) plus a
//! single-line compose buffer. `Enter` appends the composed line to the
//! reported state and clears the buffer; `Up`/`Down` scroll the backlog.

use crossterm::event::KeyCode;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::{bind_key, border_style};

pub struct Chat {
    id: ComponentId,
    focused: bool,
    backlog: Vec<String>,
    sent: Vec<String>,
    scroll: usize,
    compose: String,
    cursor: usize,
    dirty: bool,
    state_key: String,
}

impl Chat {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            backlog: read_messages(config),
            sent: Vec::new(),
            scroll: 0,
            compose: String::new(),
            cursor: 0,
            dirty: false,
        }
    }

    fn visible_messages(&self) -> Vec<&str> {
        self.backlog.iter().chain(self.sent.iter()).map(String::as_str).collect()
    }
}

fn read_messages(config: &RenderConfig) -> Vec<String> {
    config
        .props
        .get("messages")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())).collect())
        .unwrap_or_default()
}

impl ComponentInstance for Chat {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        let log_height = area.height.saturating_sub(3);
        let log_area = Rect::new(area.x, area.y, area.width, log_height);
        let compose_area = Rect::new(area.x, area.y + log_height, area.width, area.height.saturating_sub(log_height));

        let all = self.visible_messages();
        let total = all.len();
        let viewport = log_height.saturating_sub(2) as usize;
        let end = total.saturating_sub(self.scroll.min(total));
        let start = end.saturating_sub(viewport);
        let lines = all[start..end].join("\n");

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).border_style(border_style(self.focused)).title("chat"))
            .render(log_area, buf);

        Paragraph::new(self.compose.as_str())
            .style(Style::default().fg(Color::White))
            .block(Block::default().borders(Borders::ALL).border_style(border_style(self.focused)))
            .render(compose_area, buf);

        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        self.cursor = self.cursor.min(self.compose.len());

        match key.code {
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_add(1);
                UpdateResponse::Handled
            }
            KeyCode::Down => {
                self.scroll = self.scroll.saturating_sub(1);
                UpdateResponse::Handled
            }
            KeyCode::Char(c) => {
                self.compose.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                UpdateResponse::Handled
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return UpdateResponse::Ignored;
                }
                let char_start = self.compose[..self.cursor].char_indices().last().map(|(i, _)| i).unwrap_or(0);
                self.compose.drain(char_start..self.cursor);
                self.cursor = char_start;
                UpdateResponse::Handled
            }
            KeyCode::Enter => {
                if self.compose.is_empty() {
                    return UpdateResponse::Ignored;
                }
                self.sent.push(std::mem::take(&mut self.compose));
                self.cursor = 0;
                self.scroll = 0;
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
        "chat"
    }

    fn update_render_config(&mut self, config: &RenderConfig) {
        self.backlog = read_messages(config);
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            changes.insert(
                self.state_key.clone(),
                Value::Array(self.sent.iter().cloned().map(Value::String).collect()),
            );
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

    fn chat_with_backlog() -> Chat {
        let mut props = HashMap::new();
        props.insert("messages".to_string(), json!(["hi there"]));
        let config = RenderConfig::new(props, 30, 10);
        let mut chat = Chat::new(ComponentId::new("room"), &config);
        chat.set_focus(true);
        chat
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(crossterm::event::KeyEvent::new(code, crossterm::event::KeyModifiers::empty()))
    }

    #[test]
    fn enter_sends_composed_message() {
        let mut chat = chat_with_backlog();
        chat.update(&key(KeyCode::Char('h')));
        chat.update(&key(KeyCode::Char('i')));
        chat.update(&key(KeyCode::Enter));
        assert_eq!(chat.compose, "");
        let (changes, changed) = chat.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("room"), Some(&Value::Array(vec![Value::String("hi".into())])));
    }

    #[test]
    fn empty_compose_enter_is_ignored() {
        let mut chat = chat_with_backlog();
        let response = chat.update(&key(KeyCode::Enter));
        assert_eq!(response, UpdateResponse::Ignored);
    }
}
