//! Action Executor: validates and runs an [`ActionSpec`], per §4.H.
//!
//! Built-in `tui.*` process names are handled natively and never reach the
//! external [`ProcessRegistry`] — native handlers return their effect
//! directly rather than round-tripping through a registry call. Everything
//! else is routed to whichever external collaborator the host registered;
//! `onSuccess`/`onError` name the state key the result (or error message) is
//! written to.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::bus::EventBus;
use crate::config::ActionSpec;
use crate::effect::{DispatchResult, SessionEffect};
use crate::error::ActionError;
use crate::expr::{ExpressionCache, FunctionTable};
use crate::focus::FocusManager;
use crate::middleware::Middleware;
use crate::state::StateStore;

/// `run(name, args) -> (value | error message)`. Implemented by the host
/// application; built-in `tui.*` names never reach it.
pub trait ProcessRegistry: Send + Sync {
    fn run(&self, name: &str, args: &[Value]) -> ProcessOutcome;
}

pub type ProcessOutcome = Result<Value, String>;

/// `invoke(script, method, args) -> (value | error message)`. A method not
/// found on the named script surfaces as an error rather than a panic.
pub trait ScriptHost: Send + Sync {
    fn invoke(&self, script: &str, method: &str, args: &[Value]) -> Result<Value, String>;
}

/// Everything a single [`ActionSpec`] execution needs besides the spec
/// itself. Borrowed fresh for each call so the executor itself stays
/// stateless aside from its registered collaborators.
pub struct ActionContext<'a> {
    pub state: &'a StateStore,
    pub cache: &'a ExpressionCache,
    pub focus: &'a mut FocusManager,
    pub bus: &'a mut EventBus,
}

const BUILTIN_PROCESSES: &[&str] = &[
    "tui.quit",
    "tui.exit",
    "tui.focus.next",
    "tui.focus.prev",
    "tui.form.submit",
    "tui.refresh",
    "tui.clear",
    "tui.suspend",
];

pub fn is_builtin_process(name: &str) -> bool {
    BUILTIN_PROCESSES.contains(&name)
}

#[derive(Default)]
pub struct ActionExecutor {
    process_registry: Option<Box<dyn ProcessRegistry>>,
    script_host: Option<Box<dyn ScriptHost>>,
    functions: FunctionTable,
    middleware: Mutex<Option<Box<dyn Middleware>>>,
    /// Prepended as arg 0 to every external `process` call (§4.H).
    session_id: String,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self {
            process_registry: None,
            script_host: None,
            functions: FunctionTable::with_builtins(),
            middleware: Mutex::new(None),
            session_id: String::new(),
        }
    }

    pub fn with_process_registry(mut self, registry: Box<dyn ProcessRegistry>) -> Self {
        self.process_registry = Some(registry);
        self
    }

    pub fn with_script_host(mut self, host: Box<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    /// Sets the session id prepended to every external (non-builtin)
    /// process call's args, per §4.H.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Installs the middleware chain observing every action this executor
    /// runs (§"Middleware-style composability" in SPEC_FULL.md). A `Mutex`
    /// gives `execute` interior mutability without forcing every caller
    /// along the dispatch path to hold `&mut ActionExecutor`.
    pub fn with_middleware(self, middleware: Box<dyn Middleware>) -> Self {
        *self.middleware.lock().expect("middleware lock poisoned") = Some(middleware);
        self
    }

    pub fn execute(&self, spec: &ActionSpec, ctx: &mut ActionContext<'_>) -> DispatchResult<SessionEffect> {
        if let Some(mw) = self.middleware.lock().expect("middleware lock poisoned").as_mut() {
            mw.before(spec);
        }
        let result = self.execute_inner(spec, ctx);
        if let Some(mw) = self.middleware.lock().expect("middleware lock poisoned").as_mut() {
            let succeeded = !result.effects.is_empty() || result.changed;
            mw.after(spec, succeeded);
        }
        result
    }

    fn execute_inner(&self, spec: &ActionSpec, ctx: &mut ActionContext<'_>) -> DispatchResult<SessionEffect> {
        match spec {
            ActionSpec::Process { name, args, on_success, on_error } => {
                let resolved = resolve_args(args, ctx.state, ctx.cache, &self.functions);
                if is_builtin_process(name) {
                    return self.run_builtin(name, ctx);
                }
                match &self.process_registry {
                    Some(registry) => {
                        // External names get the session id prepended as
                        // arg 0 (§4.H); builtins never reach this branch.
                        let mut call_args = Vec::with_capacity(resolved.len() + 1);
                        call_args.push(Value::String(self.session_id.clone()));
                        call_args.extend(resolved);
                        let outcome = registry.run(name, &call_args);
                        route_outcome(outcome, on_success.as_deref(), on_error.as_deref(), ctx.state)
                    }
                    None => {
                        tracing::warn!(process = name, "no process registry registered for a non-builtin process");
                        route_outcome(
                            Err(ActionError::UnknownProcess(name.clone()).to_string()),
                            on_success.as_deref(),
                            on_error.as_deref(),
                            ctx.state,
                        )
                    }
                }
            }
            ActionSpec::Script { name, method, args, on_success, on_error } => {
                let resolved = resolve_args(args, ctx.state, ctx.cache, &self.functions);
                match &self.script_host {
                    Some(host) => {
                        let outcome = host.invoke(name, method, &resolved);
                        route_outcome(outcome, on_success.as_deref(), on_error.as_deref(), ctx.state)
                    }
                    None => route_outcome(
                        Err(ActionError::NoScriptHost.to_string()),
                        on_success.as_deref(),
                        on_error.as_deref(),
                        ctx.state,
                    ),
                }
            }
            ActionSpec::Payload(map) => {
                let resolved = resolve_payload(map, ctx.state, ctx.cache, &self.functions);
                ctx.state.batch(resolved);
                DispatchResult::changed()
            }
        }
    }

    fn run_builtin(&self, name: &str, ctx: &mut ActionContext<'_>) -> DispatchResult<SessionEffect> {
        match name {
            "tui.quit" | "tui.exit" => DispatchResult::changed().with(SessionEffect::Quit),
            "tui.focus.next" => ctx.focus.focus_step(false),
            "tui.focus.prev" => ctx.focus.focus_step(true),
            "tui.form.submit" => DispatchResult::changed().with(SessionEffect::SubmitForm),
            "tui.refresh" => DispatchResult::changed().with(SessionEffect::Refresh),
            "tui.clear" => DispatchResult::changed().with(SessionEffect::ClearScreen),
            "tui.suspend" => DispatchResult::changed().with(SessionEffect::Suspend),
            _ => unreachable!("is_builtin_process gated this call"),
        }
    }
}

fn route_outcome(
    outcome: ProcessOutcome,
    on_success: Option<&str>,
    on_error: Option<&str>,
    state: &StateStore,
) -> DispatchResult<SessionEffect> {
    match outcome {
        Ok(value) => {
            if let Some(key) = on_success {
                state.set(key.to_string(), value);
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }
        Err(message) => {
            if let Some(key) = on_error {
                state.set(key.to_string(), Value::String(message));
                DispatchResult::changed()
            } else {
                tracing::warn!(error = %message, "action failed with no onError handler");
                DispatchResult::unchanged()
            }
        }
    }
}

fn resolve_args(args: &[Value], state: &StateStore, cache: &ExpressionCache, functions: &FunctionTable) -> Vec<Value> {
    args.iter().map(|v| resolve_value(v, state, cache, functions)).collect()
}

fn resolve_payload(
    map: &HashMap<String, Value>,
    state: &StateStore,
    cache: &ExpressionCache,
    functions: &FunctionTable,
) -> HashMap<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, state, cache, functions)))
        .collect()
}

fn resolve_value(value: &Value, state: &StateStore, cache: &ExpressionCache, functions: &FunctionTable) -> Value {
    match value {
        Value::String(s) if s.contains("{{") => cache.resolve(s, state, functions),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, state, cache, functions)).collect())
        }
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, state, cache, functions)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutNode;
    use serde_json::json;

    /// Echoes its second argument: arg 0 is always the prepended session id
    /// (§4.H), so the "real" first caller-supplied argument is at index 1.
    struct EchoRegistry;
    impl ProcessRegistry for EchoRegistry {
        fn run(&self, name: &str, args: &[Value]) -> ProcessOutcome {
            if name == "echo" {
                Ok(args.get(1).cloned().unwrap_or(Value::Null))
            } else {
                Err(format!("unknown process {name}"))
            }
        }
    }

    /// Captures every call it receives verbatim, for asserting on the
    /// prepended session id.
    struct RecordingRegistry {
        calls: std::sync::Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    }
    impl ProcessRegistry for RecordingRegistry {
        fn run(&self, name: &str, args: &[Value]) -> ProcessOutcome {
            self.calls.lock().unwrap().push((name.to_string(), args.to_vec()));
            Ok(Value::Null)
        }
    }

    fn ctx<'a>(state: &'a StateStore, cache: &'a ExpressionCache, focus: &'a mut FocusManager, bus: &'a mut EventBus) -> ActionContext<'a> {
        ActionContext { state, cache, focus, bus }
    }

    #[test]
    fn builtin_quit_is_never_forwarded_to_process_registry() {
        let executor = ActionExecutor::new().with_process_registry(Box::new(EchoRegistry));
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "tui.quit".to_string(),
            args: vec![],
            on_success: None,
            on_error: None,
        };
        let result = executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
        assert!(result.effects.contains(&SessionEffect::Quit));
    }

    #[test]
    fn process_success_routes_to_on_success_key() {
        let executor = ActionExecutor::new().with_process_registry(Box::new(EchoRegistry));
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "echo".to_string(),
            args: vec![json!("hi")],
            on_success: Some("result".to_string()),
            on_error: None,
        };
        executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
        assert_eq!(state.get("result").0, Some(json!("hi")));
    }

    #[test]
    fn unknown_process_without_registry_routes_to_on_error() {
        let executor = ActionExecutor::new();
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "custom.thing".to_string(),
            args: vec![],
            on_success: None,
            on_error: Some("err".to_string()),
        };
        executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
        assert!(state.get("err").1);
    }

    #[test]
    fn payload_action_patches_state_directly() {
        let executor = ActionExecutor::new();
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let mut payload = HashMap::new();
        payload.insert("count".to_string(), json!(5));
        let spec = ActionSpec::Payload(payload);
        let result = executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
        assert!(result.changed);
        assert_eq!(state.get("count").0, Some(json!(5)));
    }

    #[test]
    fn args_with_expr_are_resolved_against_state() {
        let executor = ActionExecutor::new().with_process_registry(Box::new(EchoRegistry));
        let state = StateStore::new();
        state.set("name", json!("Ada"));
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "echo".to_string(),
            args: vec![json!("hello {{name}}")],
            on_success: Some("greeting".to_string()),
            on_error: None,
        };
        executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
        assert_eq!(state.get("greeting").0, Some(json!("hello Ada")));
    }

    #[test]
    fn external_process_gets_session_id_prepended_as_first_arg() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let executor = ActionExecutor::new()
            .with_process_registry(Box::new(RecordingRegistry { calls: calls.clone() }))
            .with_session_id("session-42");
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "notify".to_string(),
            args: vec![json!("hello")],
            on_success: None,
            on_error: None,
        };
        executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "notify");
        assert_eq!(recorded[0].1, vec![json!("session-42"), json!("hello")]);
    }

    #[test]
    fn focus_next_builtin_delegates_to_focus_manager() {
        use crate::config::{Direction, Node, Padding, SizeSpec};
        use ratatui::layout::Rect;

        let executor = ActionExecutor::new();
        let state = StateStore::new();
        let cache = ExpressionCache::new();
        let mut focus = FocusManager::new(false, true);
        let root = LayoutNode {
            id: crate::msg::ComponentId::new("root"),
            component_type: None,
            area: Rect::new(0, 0, 10, 10),
            node: Node {
                id: Some("root".into()),
                component_type: None,
                direction: Direction::Row,
                width: SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 },
                height: SizeSpec::Flex { basis: 0, grow: 1, shrink: 1 },
                padding: Padding::default(),
                gap: 0,
                border: false,
                props: HashMap::new(),
                bind: None,
                children: Vec::new(),
            },
            children: Vec::new(),
        };
        focus.sync_layout(&root);
        let mut bus = EventBus::new();
        let spec = ActionSpec::Process {
            name: "tui.focus.next".to_string(),
            args: vec![],
            on_success: None,
            on_error: None,
        };
        executor.execute(&spec, &mut ctx(&state, &cache, &mut focus, &mut bus));
    }
}
