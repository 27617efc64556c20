//! Terminal front end: sets up the screen and runs the event loop

pub mod conversation;

use crate::api::ChatClient;
use crate::config::Config;
use crate::events::{AppEvent, TuiEvent};
use anyhow::{Context, Result};
use conversation::{ConversationAction, ConversationManager};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// How long to wait for terminal input before checking app events again
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the interactive chat until the user quits
pub async fn run(config: Config) -> Result<()> {
    let client = ChatClient::new(config.clone())?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut manager = ConversationManager::new(Arc::new(client), &config.ui, tx);

    tracing::info!(base_url = %config.base_url, "Starting chat session");

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut manager, &mut rx).await;
    restore_terminal(&mut terminal)?;

    tracing::info!(
        messages = manager.session().len(),
        conversation_id = manager.session().conversation_id().map(|c| c.as_str()).unwrap_or("-"),
        "Chat session ended"
    );
    result
}

async fn event_loop(
    terminal: &mut Tui,
    manager: &mut ConversationManager,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut needs_draw = true;

    loop {
        while let Ok(event) = rx.try_recv() {
            manager.handle_app_event(event);
        }

        if manager.take_redraw() || needs_draw {
            terminal
                .draw(|frame| manager.render(frame.size(), frame.buffer_mut()))
                .context("Failed to draw frame")?;
            needs_draw = false;
        }

        if event::poll(POLL_INTERVAL).context("Failed to poll terminal events")? {
            let raw = event::read().context("Failed to read terminal event")?;
            match TuiEvent::from_crossterm(raw) {
                Some(TuiEvent::Key(key)) => {
                    if is_interrupt(&key) {
                        return Ok(());
                    }
                    if manager.handle_key(key) == ConversationAction::Exit {
                        return Ok(());
                    }
                }
                Some(TuiEvent::Paste(text)) => manager.handle_paste(&text),
                Some(TuiEvent::Resize(_, _)) => needs_draw = true,
                None => {}
            }
        }

        // Let the exchange and timer tasks make progress
        tokio::task::yield_now().await;
    }
}

fn is_interrupt(key: &event::KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    #[test]
    fn ctrl_c_and_ctrl_d_interrupt() {
        assert!(is_interrupt(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(is_interrupt(&KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
