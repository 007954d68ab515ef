//! Typed error taxonomy for the engine.
//!
//! Each variant here corresponds to one row of the error-handling policy
//! table: configuration errors are fatal at load time, expression/render
//! errors degrade gracefully in place, and action errors are routed back
//! into state rather than aborting the session.

use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration has an empty name")]
    EmptyName,

    #[error("unknown layout direction: {0:?}")]
    UnknownDirection(String),

    #[error("unknown component type: {0:?}")]
    UnknownComponentType(String),

    #[error("layout nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },

    #[error("binding {key:?} references action with no process/script/payload set")]
    InvalidBinding { key: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} validation error(s): {1}")]
    Multiple(usize, String),
}

/// Errors raised while compiling or evaluating an `{{expr}}` program.
///
/// Per spec these are non-fatal: callers log a warning once per source text
/// and fall back to the literal text rather than propagating the error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEof,

    #[error("unexpected token {0:?} at position {1}")]
    UnexpectedToken(String, usize),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("wrong number of arguments for {name:?}: expected {expected}, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),
}

/// Errors raised by the layout solver.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout nesting exceeds the maximum depth of {max} at node {node_id:?}")]
    DepthExceeded { node_id: String, max: usize },
}

/// Errors raised while resolving props or invoking an instance's `render`.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("component {id:?} failed to render: {source}")]
    Instance {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Errors raised while resolving or dispatching an action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action must set exactly one of process, script, or payload")]
    AmbiguousVariant,

    #[error("unknown process: {0:?}")]
    UnknownProcess(String),

    #[error("process {name:?} failed: {message}")]
    ProcessFailed { name: String, message: String },

    #[error("no script host is registered")]
    NoScriptHost,

    #[error("script {name:?} failed: {message}")]
    ScriptFailed { name: String, message: String },

    #[error("method {method:?} not found on script {script:?}")]
    MethodNotFound { script: String, method: String },
}

/// Top-level session errors: anything that should abort the run loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}
