//! Cross-cutting hooks around action execution.
//!
//! Generalized from the teacher's `Store`-oriented `Middleware<A: Action>`
//! trait: actions are no longer a user-defined Rust enum, they're the
//! `ActionSpec` config value, so the hook is keyed on that instead.

use crate::config::ActionSpec;

/// Implement this to observe (or veto logging noise around) every action
/// the executor runs, without forking the executor itself.
pub trait Middleware: Send {
    /// Called before the action is resolved and dispatched.
    fn before(&mut self, action: &ActionSpec) {
        let _ = action;
    }

    /// Called after the action completed, successfully or not.
    fn after(&mut self, action: &ActionSpec, succeeded: bool) {
        let _ = (action, succeeded);
    }
}

/// A middleware that does nothing; the default when a session doesn't
/// need observability hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {}

/// Logs every action at `debug` level before and/or after execution.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    pub log_before: bool,
    pub log_after: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, action: &ActionSpec) {
        if self.log_before {
            tracing::debug!(action = ?action, "dispatching action");
        }
    }

    fn after(&mut self, action: &ActionSpec, succeeded: bool) {
        if self.log_after {
            tracing::debug!(action = ?action, succeeded, "action executed");
        }
    }
}

/// Runs a sequence of middleware as one. `before` hooks run in registration
/// order, `after` hooks run in reverse order for proper nesting.
#[derive(Default)]
pub struct ComposedMiddleware {
    layers: Vec<Box<dyn Middleware>>,
}

impl ComposedMiddleware {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.layers.push(Box::new(middleware));
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, action: &ActionSpec) {
        for layer in &mut self.layers {
            layer.before(action);
        }
    }

    fn after(&mut self, action: &ActionSpec, succeeded: bool) {
        for layer in self.layers.iter_mut().rev() {
            layer.after(action, succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingMiddleware {
        before_count: usize,
        after_count: usize,
    }

    impl Middleware for CountingMiddleware {
        fn before(&mut self, _action: &ActionSpec) {
            self.before_count += 1;
        }

        fn after(&mut self, _action: &ActionSpec, _succeeded: bool) {
            self.after_count += 1;
        }
    }

    fn payload_action() -> ActionSpec {
        ActionSpec::Payload(Default::default())
    }

    #[test]
    fn composed_runs_before_in_order_and_after_reversed() {
        let mut composed = ComposedMiddleware::new();
        composed.add(CountingMiddleware::default());
        composed.add(CountingMiddleware::default());

        let action = payload_action();
        composed.before(&action);
        composed.after(&action, true);

        assert_eq!(composed.layers.len(), 2);
    }

    #[test]
    fn noop_does_nothing() {
        let mut noop = NoopMiddleware;
        noop.before(&payload_action());
        noop.after(&payload_action(), true);
    }
}
