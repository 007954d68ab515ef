//! `text`: the one non-focusable builtin leaf. Renders a `text` prop
//! (already `{{expr}}`-resolved by the time it reaches `render`) as a
//! paragraph; never receives focus and never reports state changes.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::{Paragraph, Widget};
use serde_json::Value;

use tuiflow_core::{ComponentId, ComponentInstance, Msg, RenderConfig, RenderError, UpdateResponse};

use crate::chrome::prop_str;

pub struct Text {
    id: ComponentId,
}

impl Text {
    pub fn new(id: ComponentId) -> Self {
        Self { id }
    }
}

impl ComponentInstance for Text {
    fn render(&mut self, buf: &mut Buffer, area: Rect, config: &RenderConfig) -> Result<(), RenderError> {
        let content = match config.props.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let align = match prop_str(config, "align", "left") {
            "center" => ratatui::layout::Alignment::Center,
            "right" => ratatui::layout::Alignment::Right,
            _ => ratatui::layout::Alignment::Left,
        };
        Paragraph::new(content).style(Style::default()).alignment(align).render(area, buf);
        Ok(())
    }

    fn update(&mut self, _msg: &Msg) -> UpdateResponse {
        UpdateResponse::Ignored
    }

    fn get_id(&self) -> &ComponentId {
        &self.id
    }

    fn set_focus(&mut self, _focused: bool) {}

    fn get_focus(&self) -> bool {
        false
    }

    fn get_component_type(&self) -> &'static str {
        "text"
    }

    fn update_render_config(&mut self, _config: &RenderConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn renders_text_prop() {
        let mut text = Text::new(ComponentId::new("t"));
        let area = Rect::new(0, 0, 10, 1);
        let mut buf = Buffer::empty(area);
        let mut props = HashMap::new();
        props.insert("text".to_string(), Value::String("hi".into()));
        let config = RenderConfig::new(props, 10, 1);
        text.render(&mut buf, area, &config).unwrap();
        assert_eq!(buf[(0, 0)].symbol(), "h");
        assert_eq!(buf[(1, 0)].symbol(), "i");
    }

    #[test]
    fn never_focusable() {
        let mut text = Text::new(ComponentId::new("t"));
        text.set_focus(true);
        assert!(!text.get_focus());
    }
}
