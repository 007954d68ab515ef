//! tuiflow-core: the reactive engine behind a declarative, config-driven
//! terminal UI.
//!
//! A session loads a JSON(-with-comments) [`config::Configuration`] describing
//! a tree of [`config::Node`]s, then runs a loop that
//!
//! 1. measures and places that tree with the [`layout`] solver,
//! 2. draws it with the [`renderer`], resolving `{{expr}}` bindings through
//!    the [`expr::ExpressionCache`] against the [`state::StateStore`],
//! 3. routes input through the [`dispatch`] Message Dispatcher to whichever
//!    [`component::ComponentInstance`] has focus (tracked by
//!    [`focus::FocusManager`]),
//! 4. and executes the [`config::ActionSpec`]s those components or key
//!    bindings produce via the [`action_exec::ActionExecutor`].
//!
//! [`session::Session`] owns all of the above and drives the loop end to
//! end. [`host::HostApi`] is the same set of mutations, exposed to the
//! external [`action_exec::ScriptHost`] implementations a host application
//! plugs in.

pub mod action_exec;
pub mod bus;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod expr;
pub mod focus;
pub mod host;
pub mod keybindings;
pub mod layout;
pub mod middleware;
pub mod msg;
pub mod renderer;
pub mod session;
pub mod state;
pub mod testing;

pub use action_exec::{ActionExecutor, ProcessOutcome, ProcessRegistry, ScriptHost};
pub use bus::EventBus;
pub use component::{ComponentInstance, FactoryRegistry, InstanceRegistry, RenderConfig};
pub use config::{ActionSpec, Configuration, Direction, Node, Padding, SizeSpec};
pub use dispatch::MessageDispatcher;
pub use effect::{DispatchResult, SessionEffect};
pub use error::{ActionError, ConfigError, ExprError, LayoutError, RenderError, SessionError};
pub use expr::ExpressionCache;
pub use focus::FocusManager;
pub use host::HostApi;
pub use keybindings::KeyBindings;
pub use layout::LayoutNode;
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
pub use msg::{ComponentId, Msg, MsgKind, StateChanges, UpdateResponse};
pub use renderer::Renderer;
pub use session::Session;
pub use state::StateStore;

/// Re-exports commonly needed together when wiring a host application.
pub mod prelude {
    pub use crate::action_exec::{ActionExecutor, ProcessOutcome, ProcessRegistry, ScriptHost};
    pub use crate::component::{ComponentInstance, FactoryRegistry, RenderConfig};
    pub use crate::config::{ActionSpec, Configuration};
    pub use crate::effect::{DispatchResult, SessionEffect};
    pub use crate::error::SessionError;
    pub use crate::host::HostApi;
    pub use crate::msg::{ComponentId, Msg, UpdateResponse};
    pub use crate::session::Session;

    pub use ratatui::{
        buffer::Buffer,
        layout::Rect,
        style::{Color, Modifier, Style},
        text::{Line, Span, Text},
    };
}
