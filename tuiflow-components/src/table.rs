//! `table`: a row/column browser over `props.rows` (array of
//! array-of-string) with an optional `props.columns` header row.

use crossterm::event::KeyCode;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, StatefulWidget, Table as RatatuiTable, TableState};
use serde_json::{json, Value};

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, StateChanges, UpdateResponse};

use crate::chrome::bind_key;

pub struct Table {
    id: ComponentId,
    focused: bool,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    selected_row: usize,
    selected_col: usize,
    dirty: bool,
    state_key: String,
}

impl Table {
    pub fn new(id: ComponentId, config: &RenderConfig) -> Self {
        Self {
            state_key: bind_key(config, &id),
            id,
            focused: false,
            columns: read_columns(config),
            rows: read_rows(config),
            selected_row: 0,
            selected_col: 0,
            dirty: false,
        }
    }

    fn move_row(&mut self, delta: i32) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() as i32 - 1;
        let next = (self.selected_row as i32 + delta).clamp(0, last) as usize;
        if next != self.selected_row {
            self.selected_row = next;
            self.dirty = true;
        }
    }

    fn move_col(&mut self, delta: i32) {
        let width = self.columns.len().max(self.rows.first().map(Vec::len).unwrap_or(0));
        if width == 0 {
            return;
        }
        let last = width as i32 - 1;
        let next = (self.selected_col as i32 + delta).clamp(0, last) as usize;
        if next != self.selected_col {
            self.selected_col = next;
            self.dirty = true;
        }
    }
}

fn read_columns(config: &RenderConfig) -> Vec<String> {
    config
        .props
        .get("columns")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn read_rows(config: &RenderConfig) -> Vec<Vec<String>> {
    config
        .props
        .get("rows")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string())).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

impl ComponentInstance for Table {
    fn render(&mut self, buf: &mut Buffer, area: Rect, _config: &RenderConfig) -> Result<(), RenderError> {
        let border_style = if self.focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };
        let widths = vec![Constraint::Fill(1); self.columns.len().max(1)];

        let header = (!self.columns.is_empty()).then(|| {
            Row::new(self.columns.iter().map(|c| Cell::from(c.as_str())).collect::<Vec<_>>())
                .style(Style::default().add_modifier(Modifier::BOLD))
        });

        let rows: Vec<Row> = self
            .rows
            .iter()
            .enumerate()
            .map(|(r, cells)| {
                let style = if r == self.selected_row && self.focused {
                    Style::default().fg(Color::Black).bg(Color::White)
                } else {
                    Style::default()
                };
                Row::new(cells.iter().map(|c| Cell::from(c.as_str())).collect::<Vec<_>>()).style(style)
            })
            .collect();

        let mut table = RatatuiTable::new(rows, widths).block(Block::default().borders(Borders::ALL).border_style(border_style));
        if let Some(header) = header {
            table = table.header(header);
        }

        let mut state = TableState::default().with_selected((!self.rows.is_empty()).then_some(self.selected_row));
        StatefulWidget::render(table, area, buf, &mut state);
        Ok(())
    }

    fn update(&mut self, msg: &Msg) -> UpdateResponse {
        let Msg::Key(key) = msg else { return UpdateResponse::Ignored };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_row(1);
                UpdateResponse::Handled
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_row(-1);
                UpdateResponse::Handled
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.move_col(1);
                UpdateResponse::Handled
            }
            KeyCode::Char('h') | KeyCode::Left => {
                self.move_col(-1);
                UpdateResponse::Handled
            }
            KeyCode::Home => {
                if self.selected_row != 0 {
                    self.selected_row = 0;
                    self.dirty = true;
                }
                UpdateResponse::Handled
            }
            KeyCode::End => {
                if let Some(last) = self.rows.len().checked_sub(1) {
                    if last != self.selected_row {
                        self.selected_row = last;
                        self.dirty = true;
                    }
                }
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
        "table"
    }

    fn update_render_config(&mut self, config: &RenderConfig) {
        self.columns = read_columns(config);
        self.rows = read_rows(config);
        self.selected_row = self.selected_row.min(self.rows.len().saturating_sub(1));
    }

    fn get_state_changes(&mut self) -> (StateChanges, bool) {
        if self.dirty {
            self.dirty = false;
            let cell = self.rows.get(self.selected_row).and_then(|row| row.get(self.selected_col)).cloned();
            let mut changes = StateChanges::new();
            changes.insert(
                self.state_key.clone(),
                json!({"row": self.selected_row, "col": self.selected_col, "value": cell}),
            );
            (changes, true)
        } else {
            (StateChanges::new(), false)
        }
    }
}
