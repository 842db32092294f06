pub mod app;
mod stream;
mod style;
mod ui;

use crate::k8s::watch::WatchManager;
use crate::tui::app::{Action, App};
use crate::tui::stream::async_key_events;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::stream::StreamExt;
use ratatui::prelude::*;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, warn};

/// How often connection states are re-read from the manager
const REFRESH_MS: u64 = 250;

/// Most watch events folded into the view between two redraws
const MAX_EVENTS_PER_FRAME: usize = 256;

/// # Errors
///
/// Will return `Err` if function cannot access a terminal or render a ui
pub async fn run(manager: Arc<WatchManager>) -> Result<(), Box<dyn std::error::Error>> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &manager).await;

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("{err:?}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    manager: &WatchManager,
) -> io::Result<()> {
    let mut events = manager
        .take_event_queue()
        .ok_or_else(|| io::Error::other("watch event queue already taken"))?;
    let mut errors = manager
        .take_error_queue()
        .ok_or_else(|| io::Error::other("watch error queue already taken"))?;

    let should_stop = Arc::new(AtomicBool::new(false));
    let mut key_events = async_key_events(should_stop.clone());
    let mut refresh = tokio::time::interval(Duration::from_millis(REFRESH_MS));

    let mut app = App::new(manager.watched_kinds().await, manager.namespace().await);
    app.debug = manager.debug_mode().await;

    loop {
        terminal.draw(|f| ui::ui(f, &mut app))?;

        tokio::select! {
            Some(event) = events.recv() => {
                app.apply_event(&event);
                // fold whatever else is already queued into this frame
                for _ in 0..MAX_EVENTS_PER_FRAME {
                    match events.try_recv() {
                        Ok(event) => app.apply_event(&event),
                        Err(_) => break,
                    }
                }
            }
            Some(err) = errors.recv() => {
                warn!("{err}");
                app.apply_error(err);
            }
            Some(key) = key_events.next() => {
                let action = app.handle_event(&key);
                if action == Action::Quit {
                    break;
                }
                perform(manager, &mut app, action).await;
            }
            _ = refresh.tick() => {
                app.set_connection_states(
                    manager.overall_connection_state().await,
                    manager.connection_states().await,
                    manager.resource_versions().await,
                );
            }
        }
    }

    should_stop.store(true, Ordering::Relaxed);
    Ok(())
}

async fn perform(manager: &WatchManager, app: &mut App, action: Action) {
    let result = match action {
        Action::None | Action::Quit => return,
        Action::RestartWatcher(kind) => manager.restart_watcher(kind).await,
        Action::RestartAll => manager.restart_all().await,
        Action::SetDebug(debug) => {
            manager.set_debug_mode(debug).await;
            Ok(())
        }
        Action::UpdateNamespace(namespace) => manager.update_namespace(namespace).await,
    };
    app.status_message = result.err().map(|e| format!("error: {e}"));
}
