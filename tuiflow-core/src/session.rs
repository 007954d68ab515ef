//! Session Loop: owns every collaborator and drives init → event → update →
//! render → quit, per §4.K.
//!
//! Concurrent producers (the crossterm poller, scripts via [`crate::host::HostApi`],
//! process callbacks) all enqueue onto a single bounded `tokio::sync::mpsc`
//! channel ("Bridge", §5); a full channel drops the message rather than
//! blocking the producer, which is the engine's one documented
//! back-pressure policy.

use std::io::Write;
use std::time::Duration;

use crossterm::event::Event as CEvent;
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::action_exec::{ActionContext, ActionExecutor};
use crate::bus::EventBus;
use crate::component::{is_focusable, ComponentInstance, FactoryRegistry, InstanceRegistry, RenderConfig};
use crate::config::{ActionSpec, Configuration};
use crate::dispatch::{validate_and_correct_focus, DispatchCycle, MessageDispatcher};
use crate::effect::{DispatchResult, SessionEffect};
use crate::error::SessionError;
use crate::expr::{ExpressionCache, FunctionTable};
use crate::focus::FocusManager;
use crate::layout::{self, LayoutNode};
use crate::msg::{ComponentId, Msg};
use crate::renderer::{error_state_patch, resolve_props, Renderer};
use crate::state::StateStore;

/// The default Bridge capacity. Chosen generously relative to plausible
/// per-frame input volume; a session that fills it is almost certainly
/// stuck, and dropping is strictly better than blocking the UI thread.
pub const BRIDGE_CAPACITY: usize = 256;

pub struct Session {
    config: Configuration,
    state: StateStore,
    cache: std::sync::Arc<ExpressionCache>,
    functions: FunctionTable,
    factories: FactoryRegistry,
    registry: InstanceRegistry,
    focus: FocusManager,
    dispatcher: MessageDispatcher,
    executor: ActionExecutor,
    bus: EventBus,
    layout: LayoutNode,
    viewport: Rect,
    bridge_tx: mpsc::Sender<Msg>,
    bridge_rx: mpsc::Receiver<Msg>,
    should_quit: bool,
}

impl Session {
    pub fn new(config: Configuration, factories: FactoryRegistry, viewport: Rect) -> Result<Self, SessionError> {
        config.validate()?;

        let state = StateStore::from_initial(config.flatten_initial_state());
        let cache = std::sync::Arc::new(ExpressionCache::new());
        let hook_cache = cache.clone();
        state.set_invalidation_hook(std::sync::Arc::new(move || hook_cache.clear()));

        let layout = layout::solve(&config.layout, viewport)?;
        let mut focus = FocusManager::new(config.auto_focus, config.tab_cycles);
        focus.sync_layout(&layout);

        let (bridge_tx, bridge_rx) = mpsc::channel(BRIDGE_CAPACITY);

        // Falls back to `name` when the loader (an external collaborator,
        // §1) didn't derive an `id` from the config's path.
        let session_id = config.id.clone().unwrap_or_else(|| config.name.clone());

        Ok(Self {
            dispatcher: MessageDispatcher::new(config.key_bindings()),
            executor: ActionExecutor::new().with_session_id(session_id),
            bus: EventBus::new(),
            registry: InstanceRegistry::new(),
            functions: FunctionTable::with_builtins(),
            config,
            state,
            cache,
            factories,
            focus,
            layout,
            viewport,
            bridge_tx,
            bridge_rx,
            should_quit: false,
        })
    }

    pub fn sender(&self) -> mpsc::Sender<Msg> {
        self.bridge_tx.clone()
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Eagerly constructs every focusable leaf's instance, auto-focuses the
    /// first one (if configured), and enqueues `onLoad` as the session's
    /// first action. Non-focusable leaves are created lazily on first
    /// render, same as any later re-render.
    pub fn init(&mut self) -> DispatchResult<SessionEffect> {
        let mut result = DispatchResult::unchanged();

        let focusable_ids: Vec<(ComponentId, String, RenderConfig)> = self
            .layout
            .iter()
            .filter_map(|node| {
                let type_name = node.component_type.as_ref()?;
                is_focusable(type_name).then(|| {
                    let props = resolve_props(&node.node.props, &self.state, &self.cache, &self.functions);
                    let config = RenderConfig::new(props, node.area.width, node.area.height)
                        .with_bind(node.node.bind.clone());
                    (node.id.clone(), type_name.clone(), config)
                })
            })
            .collect();

        for (id, type_name, config) in focusable_ids {
            self.registry.get_or_create(id, &type_name, &self.factories, config);
        }

        result.merge(self.focus.auto_focus_if_needed());

        if let Some(action) = self.config.on_load.clone() {
            result.merge(self.run_action(&action));
        }

        result
    }

    fn run_action(&mut self, spec: &ActionSpec) -> DispatchResult<SessionEffect> {
        let mut ctx = ActionContext {
            state: &self.state,
            cache: &self.cache,
            focus: &mut self.focus,
            bus: &mut self.bus,
        };
        self.executor.execute(spec, &mut ctx)
    }

    /// Runs one full dispatch cycle: Message Dispatcher, then focus
    /// self-healing. Returns the combined result so the caller can decide
    /// whether a re-render (or a terminal-facing effect) is due.
    pub fn tick(&mut self, msg: Msg) -> DispatchResult<SessionEffect> {
        let mut cycle = DispatchCycle {
            registry: &mut self.registry,
            focus: &mut self.focus,
            state: &self.state,
            cache: &self.cache,
            bus: &mut self.bus,
            executor: &self.executor,
        };
        let mut result = self.dispatcher.dispatch(&msg, &mut cycle);

        if validate_and_correct_focus(&mut self.focus, &mut self.registry) > 0 {
            result.changed = true;
        }

        result
    }

    /// Applies non-terminal effects (quit, focus moves, bus publishes)
    /// in place and returns whichever effects need the terminal driver
    /// itself (alt-screen toggles, cursor visibility, clear) for the
    /// caller to act on.
    pub fn apply_effects(&mut self, effects: &[SessionEffect]) -> Vec<SessionEffect> {
        let mut terminal_effects = Vec::new();
        for effect in effects {
            match effect {
                SessionEffect::Quit | SessionEffect::Interrupt => self.should_quit = true,
                SessionEffect::PublishEvent { action, data } => self.bus.publish(action.clone(), data.clone()),
                SessionEffect::FocusNext => {
                    let r = self.focus.focus_step(false);
                    terminal_effects.extend(self.apply_effects(&r.effects));
                }
                SessionEffect::FocusPrev => {
                    let r = self.focus.focus_step(true);
                    terminal_effects.extend(self.apply_effects(&r.effects));
                }
                SessionEffect::SetFocus(id) => {
                    let r = self.focus.set_focus(ComponentId::new(id.clone()));
                    terminal_effects.extend(self.apply_effects(&r.effects));
                }
                SessionEffect::SubmitForm => {
                    // §4.H: "submit snapshots input values into state" —
                    // poll every live instance's current bound value and
                    // write it to state before announcing the submission.
                    let changes = self.registry.snapshot_state_changes();
                    if !changes.is_empty() {
                        self.state.batch(changes);
                    }
                    self.bus.publish("form.submitted", None);
                }
                other => terminal_effects.push(other.clone()),
            }
        }
        terminal_effects
    }

    pub fn render(&mut self, buf: &mut ratatui::buffer::Buffer) {
        let renderer = Renderer::new(&self.factories, &self.functions);
        let errors = renderer.render(&self.layout, buf, &mut self.registry, &self.state, &self.cache);
        if !errors.is_empty() {
            self.state.batch(error_state_patch(&errors));
        }
    }

    /// Recomputes the layout (and focus order) against a new viewport size.
    pub fn resize(&mut self, width: u16, height: u16) -> Result<(), SessionError> {
        self.viewport = Rect::new(0, 0, width, height);
        self.layout = layout::solve(&self.config.layout, self.viewport)?;
        self.focus.sync_layout(&self.layout);
        Ok(())
    }

    pub fn cleanup(&mut self) {
        self.registry.cleanup_all();
    }

    /// Drives the session end to end against a live terminal: spawns a
    /// blocking crossterm poller, processes the Bridge until a quit effect
    /// fires, and re-renders whenever a dispatch cycle reports a change.
    pub async fn run<B>(&mut self, terminal: &mut Terminal<B>) -> Result<(), SessionError>
    where
        B: Backend + Write,
    {
        let cancel = CancellationToken::new();
        let poller = spawn_input_poller(self.bridge_tx.clone(), cancel.clone());

        let init_result = self.init();
        let init_terminal_effects = self.apply_effects(&init_result.effects);
        self.apply_terminal_effects(terminal, &init_terminal_effects)?;
        terminal.draw(|f| self.render(f.buffer_mut()))?;

        while !self.should_quit {
            let Some(msg) = self.bridge_rx.recv().await else { break };

            if let Msg::Resize(w, h) = msg {
                self.resize(w, h)?;
            }

            let result = self.tick(msg);
            let terminal_effects = self.apply_effects(&result.effects);
            self.apply_terminal_effects(terminal, &terminal_effects)?;

            if self.should_quit {
                break;
            }
            if result.changed {
                terminal.draw(|f| self.render(f.buffer_mut()))?;
            }
        }

        cancel.cancel();
        poller.abort();
        self.cleanup();
        Ok(())
    }

    fn apply_terminal_effects<B>(&mut self, terminal: &mut Terminal<B>, effects: &[SessionEffect]) -> Result<(), SessionError>
    where
        B: Backend + Write,
    {
        for effect in effects {
            match effect {
                SessionEffect::ClearScreen => terminal.clear()?,
                SessionEffect::EnterAltScreen => {
                    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::EnterAlternateScreen)?;
                }
                SessionEffect::ExitAltScreen => {
                    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen)?;
                }
                SessionEffect::ShowCursor => terminal.show_cursor()?,
                SessionEffect::HideCursor => terminal.hide_cursor()?,
                SessionEffect::Refresh => {}
                SessionEffect::Suspend => {}
                _ => {}
            }
        }
        Ok(())
    }
}

/// Polls crossterm on a blocking task and forwards translated [`Msg`]s onto
/// the Bridge; a full channel drops the event rather than blocking input.
fn spawn_input_poller(tx: mpsc::Sender<Msg>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            match crossterm::event::poll(Duration::from_millis(50)) {
                Ok(true) => {
                    if let Ok(event) = crossterm::event::read() {
                        let msg = match event {
                            CEvent::Key(key) => Some(Msg::Key(key)),
                            CEvent::Mouse(mouse) => Some(Msg::Mouse(mouse)),
                            CEvent::Resize(w, h) => Some(Msg::Resize(w, h)),
                            _ => None,
                        };
                        if let Some(msg) = msg {
                            if tx.try_send(msg).is_err() {
                                tracing::warn!("bridge is full, dropping an input message");
                            }
                        }
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "crossterm poll failed");
                    break;
                }
            }
        }
    })
}
