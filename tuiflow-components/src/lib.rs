//! Built-in component implementations for the types named in
//! [`tuiflow_core::component::FOCUSABLE_TYPES`] and
//! [`tuiflow_core::component::NON_FOCUSABLE_TYPES`].
//!
//! A host application registers these once, at startup, with
//! [`register_builtin_components`]. Anything beyond this set (a custom
//! chart widget, a domain-specific editor) is registered the same way by
//! the application itself — `FactoryRegistry::register` does not care who
//! the factory belongs to.
//!
//! - [`text`]: read-only paragraph
//! - [`input`]: single-line editable field
//! - [`textarea`]: multi-line editable field
//! - [`list`]: `list`/`menu` selection with a shared implementation
//! - [`cursor`]: a movable highlighted cell on a fixed grid
//! - [`form`]: multi-field editor with tab-cycling
//! - [`table`]: row/column browser
//! - [`chat`]: scrollback plus compose line
//! - [`crud`]: record browser with a confirm-delete overlay
//! - [`modal`]: shared dim/center chrome used by `crud`

mod chat;
mod chrome;
mod crud;
mod cursor;
mod form;
mod input;
mod list;
mod modal;
mod table;
mod text;
mod textarea;

pub use chat::Chat;
pub use crud::Crud;
pub use cursor::Cursor;
pub use form::Form;
pub use input::Input;
pub use list::SelectList;
pub use modal::{centered_rect, dim_area};
pub use table::Table;
pub use text::Text;
pub use textarea::TextArea;

use tuiflow_core::FactoryRegistry;

/// Registers every builtin type under its conventional name. `list` and
/// `menu` share [`SelectList`]; only the reported `component_type` differs.
pub fn register_builtin_components(registry: &mut FactoryRegistry) {
    registry.register("text", Box::new(|id, _config| Box::new(Text::new(id))));
    registry.register("input", Box::new(|id, config| Box::new(Input::new(id, config))));
    registry.register("textarea", Box::new(|id, config| Box::new(TextArea::new(id, config))));
    registry.register("list", Box::new(|id, config| Box::new(SelectList::new(id, "list", config))));
    registry.register("menu", Box::new(|id, config| Box::new(SelectList::new(id, "menu", config))));
    registry.register("cursor", Box::new(|id, config| Box::new(Cursor::new(id, config))));
    registry.register("form", Box::new(|id, config| Box::new(Form::new(id, config))));
    registry.register("table", Box::new(|id, config| Box::new(Table::new(id, config))));
    registry.register("chat", Box::new(|id, config| Box::new(Chat::new(id, config))));
    registry.register("crud", Box::new(|id, config| Box::new(Crud::new(id, config))));
}

pub mod prelude {
    pub use crate::{register_builtin_components, Chat, Crud, Cursor, Form, Input, SelectList, Table, Text, TextArea};
}
