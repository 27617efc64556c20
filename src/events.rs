use crate::api::ChatReply;
use crate::error::ExchangeError;
use serde::{Deserialize, Serialize};

/// Internal application events delivered to the UI loop
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The in-flight exchange finished, one way or the other
    ExchangeFinished(Result<ChatReply, ExchangeError>),

    /// The typing indicator timer fired
    StatusTick { epoch: u64 },
}

/// Terminal events, already unwrapped from crossterm
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(crossterm::event::KeyEvent),

    /// Paste event
    Paste(String),

    /// Terminal resize
    Resize(u16, u16),
}

impl TuiEvent {
    /// Map a raw crossterm event, dropping the ones the client ignores
    pub fn from_crossterm(event: crossterm::event::Event) -> Option<Self> {
        match event {
            crossterm::event::Event::Key(key) => Some(TuiEvent::Key(key)),
            crossterm::event::Event::Paste(text) => Some(TuiEvent::Paste(text)),
            crossterm::event::Event::Resize(w, h) => Some(TuiEvent::Resize(w, h)),
            _ => None,
        }
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant => "Support",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            MessageRole::User => "👤",
            MessageRole::Assistant => "🤖",
        }
    }
}
