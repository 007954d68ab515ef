//! Counter - minimal tuiflow example
//!
//! The entire app is the config below: a `text` node bound to `{{count}}`,
//! and two key bindings that patch `count` via an expression-resolved
//! payload action. No Rust-level reducer, action enum, or render function —
//! the engine is the app.
//!
//! Keys: k/Up = increment, j/Down = decrement, q/Ctrl+C = quit

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tuiflow::prelude::*;
use tuiflow_components::register_builtin_components;

const COUNTER_CONFIG: &str = r#"
{
    "name": "counter",
    "data": { "count": 0 },
    "bindings": {
        "k": { "payload": { "count": "{{count + 1}}" } },
        "up": { "payload": { "count": "{{count + 1}}" } },
        "j": { "payload": { "count": "{{count - 1}}" } },
        "down": { "payload": { "count": "{{count - 1}}" } }
    },
    "layout": {
        "direction": "column",
        "children": [
            {
                "type": "text",
                "height": "flex",
                "props": {
                    "text": "Counter: {{count}}",
                    "align": "center"
                }
            },
            {
                "type": "text",
                "height": 1,
                "props": {
                    "text": "k/Up: +1  j/Down: -1  q: quit",
                    "align": "center"
                }
            }
        ]
    }
}
"#;

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B>(terminal: &mut Terminal<B>) -> io::Result<()>
where
    B: ratatui::backend::Backend + io::Write,
{
    let config = Configuration::load_from_str(COUNTER_CONFIG)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let mut factories = FactoryRegistry::new();
    register_builtin_components(&mut factories);

    let size = terminal.size()?;
    let viewport = Rect::new(0, 0, size.width, size.height);
    let mut session = Session::new(config, factories, viewport)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    session
        .run(terminal)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
