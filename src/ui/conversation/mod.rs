//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history;
pub mod indicator;
pub mod manager;

pub use commands::{get_help_text, parse_slash_command, SlashCommand};
pub use composer::{ConversationComposer, ConversationResult};
pub use history::{ConversationHistory, Notice, NoticeLevel};
pub use indicator::TypingIndicator;
pub use manager::{ConversationAction, ConversationManager, ExchangeState, SubmitOutcome};
