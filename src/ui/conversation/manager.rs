use crate::api::{validate_message, ChatReply, MessageExchange};
use crate::config::UiConfig;
use crate::error::{ExchangeError, ValidationError};
use crate::events::AppEvent;
use crate::session::{ConversationSession, Message, RedrawFlag, TranscriptTracer};
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::history::NoticeLevel;
use crate::ui::conversation::{
    get_help_text, ConversationComposer, ConversationHistory, SlashCommand, TypingIndicator,
};
use crossterm::event::KeyEvent;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Where the conversation is in its request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingResponse,
}

/// What [`ConversationManager::submit`] did with the input
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The user message was logged and the exchange started
    Sent(Message),
    /// Another exchange is in flight; nothing happened
    Busy,
}

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Drives one conversation: owns the session, the exchange state machine
/// and the widgets that show them
pub struct ConversationManager {
    session: ConversationSession,
    history: ConversationHistory,
    composer: ConversationComposer,
    indicator: TypingIndicator,
    exchange: Arc<dyn MessageExchange>,
    events: mpsc::UnboundedSender<AppEvent>,
    state: ExchangeState,
    redraw: RedrawFlag,
}

impl ConversationManager {
    pub fn new(
        exchange: Arc<dyn MessageExchange>,
        ui: &UiConfig,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let redraw = RedrawFlag::new();
        let mut session = ConversationSession::new();
        session.subscribe(Box::new(redraw.clone()));
        session.subscribe(Box::new(TranscriptTracer));

        Self {
            session,
            history: ConversationHistory::new(ui.show_agent_labels),
            composer: ConversationComposer::new("Type your message..."),
            indicator: TypingIndicator::new(
                ui.status_phrases.clone(),
                Duration::from_millis(ui.status_interval_ms),
            ),
            exchange,
            events,
            state: ExchangeState::Idle,
            redraw,
        }
    }

    /// Log the user's message and start an exchange for it.
    ///
    /// Rejected input changes nothing. While a reply is pending this is a
    /// no-op that returns [`SubmitOutcome::Busy`].
    pub fn submit(&mut self, text: &str) -> Result<SubmitOutcome, ValidationError> {
        if self.state == ExchangeState::AwaitingResponse {
            tracing::debug!("Submission ignored, a reply is still pending");
            return Ok(SubmitOutcome::Busy);
        }

        validate_message(text)?;

        self.history.clear_notice();
        let message = self.session.append_user_message(text);
        self.enter_awaiting();

        let exchange = Arc::clone(&self.exchange);
        let conversation_id = self.session.conversation_id().cloned();
        let events = self.events.clone();
        let text = text.to_string();

        tokio::spawn(async move {
            let result = exchange.send_message(&text, conversation_id.as_ref()).await;
            if events.send(AppEvent::ExchangeFinished(result)).is_err() {
                tracing::warn!("Exchange finished after the UI went away");
            }
        });

        Ok(SubmitOutcome::Sent(message))
    }

    /// Apply an event from the app channel
    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StatusTick { epoch } => {
                if self.indicator.on_tick(epoch) {
                    self.redraw.mark();
                }
            }
            AppEvent::ExchangeFinished(result) => self.finish_exchange(result),
        }
    }

    fn enter_awaiting(&mut self) {
        self.state = ExchangeState::AwaitingResponse;
        self.composer.set_disabled(true);
        self.indicator.start(self.events.clone());
        self.redraw.mark();
    }

    fn leave_awaiting(&mut self) {
        self.indicator.stop();
        self.composer.set_disabled(false);
        self.state = ExchangeState::Idle;
        self.redraw.mark();
    }

    fn finish_exchange(&mut self, result: Result<ChatReply, ExchangeError>) {
        if self.state != ExchangeState::AwaitingResponse {
            tracing::warn!("Exchange result arrived with no exchange in flight, dropping it");
            return;
        }
        self.leave_awaiting();

        match result {
            Ok(reply) => {
                if let Err(err) = self.session.adopt_conversation_id(reply.conversation_id) {
                    tracing::warn!(error = %err, "Keeping the established conversation id");
                }
                let message = self.session.append_assistant_message(
                    reply.message_id,
                    reply.content,
                    reply.agent,
                );
                tracing::info!(
                    message_id = %message.id,
                    agent = message.agent_type.as_deref().unwrap_or("-"),
                    "Reply received"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "Exchange failed");
                self.history
                    .set_notice(NoticeLevel::Error, format!("Message not answered: {}", err));
            }
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        self.redraw.mark();
        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                match self.submit(&input) {
                    Ok(SubmitOutcome::Sent(_)) => self.composer.clear(),
                    Ok(SubmitOutcome::Busy) => {}
                    // The draft stays in the box so it can be edited
                    Err(err) => self.history.set_notice(NoticeLevel::Error, err.to_string()),
                }
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.composer.handle_paste(text);
        self.redraw.mark();
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: SlashCommand) -> ConversationAction {
        match command {
            SlashCommand::Help => {
                self.history.set_notice(NoticeLevel::Info, get_help_text());
                ConversationAction::None
            }
            SlashCommand::Conversation => {
                let text = match self.session.conversation_id() {
                    Some(id) => format!("Conversation id: {}", id),
                    None => "No conversation yet; the service assigns one with its first reply."
                        .to_string(),
                };
                self.history.set_notice(NoticeLevel::Info, text);
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == ExchangeState::AwaitingResponse
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn composer(&self) -> &ConversationComposer {
        &self.composer
    }

    pub fn indicator(&self) -> &TypingIndicator {
        &self.indicator
    }

    /// Whether anything changed since the last call
    pub fn take_redraw(&self) -> bool {
        self.redraw.take()
    }

    /// Render the conversation UI components
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let content_lines = self.composer.get_content().split('\n').count() as u16;
        let composer_height = content_lines.clamp(1, 6) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),               // Header
                Constraint::Min(3),                  // History
                Constraint::Length(1),               // Typing indicator
                Constraint::Length(composer_height), // Composer
            ])
            .split(area);

        self.render_header(chunks[0], buf);
        self.history.view(self.session.messages()).render(chunks[1], buf);
        self.indicator.render(chunks[2], buf);
        self.composer.render(chunks[3], buf);

        // Palette floats over the bottom of the history
        let palette_height = self.composer.palette_height().min(chunks[1].height);
        if palette_height > 0 {
            let palette_area = Rect {
                x: chunks[1].x,
                y: chunks[1].y + chunks[1].height - palette_height,
                width: chunks[1].width,
                height: palette_height,
            };
            self.composer.render_palette(palette_area, buf);
        }
    }

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let conversation = self
            .session
            .conversation_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "new".to_string());

        let header = Line::from(vec![
            Span::styled(
                " AI Customer Support ",
                Style::default().fg(Color::White).bg(Color::Magenta).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  conversation: {}", conversation),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        buf.set_line(area.x, area.y, &header, area.width);
    }
}
