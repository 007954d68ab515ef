//! tuiflow: a declarative, config-driven terminal UI engine.
//!
//! A host loads a JSON(-with-comments) [`Configuration`] describing a tree of
//! components and key bindings, registers the built-in component factories
//! (plus any of its own), and drives a [`Session`] against a `ratatui`
//! terminal until a quit signal. State lives in one shared [`StateStore`];
//! `{{expr}}` placeholders in component props are resolved against it through
//! the [`ExpressionCache`] on every render.
//!
//! ```ignore
//! use tuiflow::prelude::*;
//! use tuiflow_components::register_builtin_components;
//!
//! let config = Configuration::load_from_str(include_str!("app.tui.json"))?;
//! let mut factories = FactoryRegistry::new();
//! register_builtin_components(&mut factories);
//!
//! let mut terminal = ratatui::init();
//! let mut session = Session::new(config, factories, terminal.size()?.into())?;
//! session.run(&mut terminal).await?;
//! ```

pub use tuiflow_core::*;
pub use tuiflow_macros::StateDiff;

pub mod prelude {
    pub use tuiflow_core::prelude::*;
    pub use tuiflow_macros::StateDiff;
}
