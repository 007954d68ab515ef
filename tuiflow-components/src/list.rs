//! `list` and `menu`: a scrollable selection list, grounded in the teacher's
//! `SelectList`. Both factory types share this implementation; `menu` is
//! registered separately only so `get_component_type()` reports the type the
//! node actually declared.

use crossterm::event::KeyCode;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List as RatatuiList, ListItem, ListState, StatefulWidget, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::bind_key;

pub struct SelectList {
    id: ComponentId,
    component_type: &'static str,
    focused: bool,
    items: Vec<String>,
    selected: usize,
    scroll_offset: usize,
    dirty: bool,
    state_key: String,
}

impl SelectList {
    pub fn new(id: ComponentId, component_type: &'static str, config: &RenderConfig) -> Self {
        let items = read_items(config);
        Self {
            state_key: bind_key(config, &id),
            id,
            component_type,
            focused: false,
            items,
            selected: 0,
            scroll_offset: 0,
            dirty: false,
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + viewport_height {
            self.scroll_offset = self.selected.saturating_sub(viewport_height - 1);
        }
    }

    fn set_selected(&mut self, index: usize) {
        if index != self.selected {
            self.selected = index;
            self.dirty = true;
        }
    }
}

fn read_items(config: &RenderConfig) -> Vec<String> {
    config
        .props
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

impl ComponentInstance for SelectList {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        let viewport_height = area.height.saturating_sub(2) as usize;
        self.ensure_visible(viewport_height);

        let items: Vec<ListItem> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let style = if i == self.selected {
                    Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::raw(item.as_str())).style(style)
            })
            .collect();

        let border_style = if self.focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };
        let list = RatatuiList::new(items)
            .block(Block::default().borders(Borders::ALL).border_style(border_style))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD));

        let mut state = ListState::default().with_selected((!self.items.is_empty()).then_some(self.selected));
        *state.offset_mut() = self.scroll_offset;
        StatefulWidget::render(list, area, buf, &mut state);
        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        if self.items.is_empty() {
            return UpdateResponse::Ignored;
        }
        let last = self.items.len() - 1;

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.set_selected((self.selected + 1).min(last));
                UpdateResponse::Handled
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.set_selected(self.selected.saturating_sub(1));
                UpdateResponse::Handled
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.set_selected(0);
                UpdateResponse::Handled
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.set_selected(last);
                UpdateResponse::Handled
            }
            KeyCode::Enter => {
                // Re-confirm the current selection even if unchanged, so a
                // binding watching this key can react to "activate".
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
        self.component_type
    }

    fn update_render_config(&mut self, config: &RenderConfig) {
        self.items = read_items(config);
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            let value = self.items.get(self.selected).cloned().unwrap_or_default();
            changes.insert(format!("{}.index", self.state_key), Value::from(self.selected));
            changes.insert(format!("{}.value", self.state_key), Value::String(value));
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

    fn list_with(items: &[&str]) -> SelectList {
        let mut props = HashMap::new();
        props.insert("items".to_string(), Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect()));
        let config = RenderConfig::new(props, 20, 5);
        let mut list = SelectList::new(ComponentId::new("menu"), "list", &config);
        list.set_focus(true);
        list
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(crossterm::event::KeyEvent::new(code, crossterm::event::KeyModifiers::empty()))
    }

    #[test]
    fn navigate_down_clamps_at_end() {
        let mut list = list_with(&["a", "b", "c"]);
        list.update(&key(KeyCode::Down));
        list.update(&key(KeyCode::Down));
        list.update(&key(KeyCode::Down));
        assert_eq!(list.selected, 2);
    }

    #[test]
    fn navigate_up_clamps_at_start() {
        let mut list = list_with(&["a", "b", "c"]);
        list.update(&key(KeyCode::Up));
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn navigation_reports_state_changes() {
        let mut list = list_with(&["a", "b"]);
        list.update(&key(KeyCode::Down));
        let (changes, changed) = list.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("menu.index"), Some(&Value::from(1)));
        assert_eq!(changes.get("menu.value"), Some(&Value::String("b".into())));
    }

    #[test]
    fn empty_list_ignores_navigation() {
        let mut list = list_with(&[]);
        let response = list.update(&key(KeyCode::Down));
        assert_eq!(response, UpdateResponse::Ignored);
    }

    #[test]
    fn component_type_reflects_registration() {
        let config = RenderConfig::new(HashMap::new(), 10, 3);
        let list = SelectList::new(ComponentId::new("m"), "menu", &config);
        assert_eq!(list.get_component_type(), "menu");
    }
}
