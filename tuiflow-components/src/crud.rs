//! `crud`: browse `props.records` (array of objects with at least a
//! `label`) with `j`/`k`, delete the selected one with `d` behind a
//! dimmed-background confirmation drawn via [`crate::modal`].

use crossterm::event::KeyCode;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, StatefulWidget, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::bind_key;
use crate::modal::{centered_rect, dim_area};

#[derive(PartialEq)]
enum Mode {
    Browse,
    ConfirmDelete,
}

pub struct Crud {
    id: ComponentId,
    focused: bool,
    records: Vec<Value>,
    selected: usize,
    mode: Mode,
    dirty: bool,
    state_key: String,
}

impl Crud {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            records: read_records(config),
            selected: 0,
            mode: Mode::Browse,
            dirty: false,
        }
    }

    fn label(record: &Value) -> String {
        record
            .as_object()
            .and_then(|o| o.get("label").or_else(|| o.get("name")))
            .and_then(|v| v.as_str())
            .unwrap_or("(record)")
            .to_string()
    }
}

fn read_records(config: &RenderConfig) -> Vec<Value> {
    config.props.get("records").and_then(|v| v.as_array()).cloned().unwrap_or_default()
}

impl ComponentInstance for Crud {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        let border_style = if self.focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };

        let items: Vec<ListItem> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let style = if i == self.selected {
                    Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Self::label(record)).style(style)
            })
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).border_style(border_style));
        let mut state = ListState::default().with_selected((!self.records.is_empty()).then_some(self.selected));
        StatefulWidget::render(list, area, buf, &mut state);

        if self.mode == Mode::ConfirmDelete {
            dim_area(buf, area, 0.5);
            let confirm_area = centered_rect(30, 3, area);
            Clear.render(confirm_area, buf);
            Paragraph::new("Delete selected record? y/n")
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Red)))
                .render(confirm_area, buf);
        }

        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };

        if self.mode == Mode::ConfirmDelete {
            return match key.code {
                KeyCode::Char('y') => {
                    self.records.remove(self.selected);
                    self.selected = self.selected.min(self.records.len().saturating_sub(1));
                    self.mode = Mode::Browse;
                    self.dirty = true;
                    UpdateResponse::Handled
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.mode = Mode::Browse;
                    UpdateResponse::Handled
                }
                _ => UpdateResponse::Handled,
            };
        }

        if self.records.is_empty() && !matches!(key.code, KeyCode::Char('n')) {
            return UpdateResponse::Ignored;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.selected = (self.selected + 1).min(self.records.len().saturating_sub(1));
                UpdateResponse::Handled
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                UpdateResponse::Handled
            }
            KeyCode::Char('d') if !self.records.is_empty() => {
                self.mode = Mode::ConfirmDelete;
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
        "crud"
    }

    fn update_render_config(&mut self, config: &RenderConfig) {
        self.records = read_records(config);
        self.selected = self.selected.min(self.records.len().saturating_sub(1));
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let mut changes = StateChanges::new();
            changes.insert(self.state_key.clone(), Value::Array(self.records.clone()));
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

    fn crud_with(records: Value) -> Crud {
        let mut props = HashMap::new();
        props.insert("records".to_string(), records);
        let config = RenderConfig::new(props, 30, 10);
        let mut crud = Crud::new(ComponentId::new("contacts"), &config);
        crud.set_focus(true);
        crud
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(crossterm::event::KeyEvent::new(code, crossterm::event::KeyModifiers::empty()))
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut crud = crud_with(json!([{"label": "Ada"}, {"label": "Grace"}]));
        crud.update(&key(KeyCode::Char('d')));
        assert!(!crud.get_state_changes().1, "no state change until confirmed");
        crud.update(&key(KeyCode::Char('y')));
        let (changes, changed) = crud.get_state_changes();
        assert!(changed);
        assert_eq!(changes.get("contacts"), Some(&json!([{"label": "Grace"}])));
    }

    #[test]
    fn cancel_delete_leaves_records_untouched() {
        let mut crud = crud_with(json!([{"label": "Ada"}]));
        crud.update(&key(KeyCode::Char('d')));
        crud.update(&key(KeyCode::Char('n')));
        assert!(!crud.get_state_changes().1);
        assert_eq!(crud.records.len(), 1);
    }
}
