//! Terminal chat client for an AI customer-support service.
//!
//! - [`session`]: the message log and conversation id
//! - [`api`]: the HTTP exchange with the chat service
//! - [`ui`]: the chat screen and its request/response state machine

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod status;
pub mod ui;

pub use api::{ChatClient, ChatReply, MessageExchange};
pub use config::Config;
pub use error::{ConversationError, ExchangeError, ValidationError};
pub use session::{ConversationId, ConversationSession, Message, MessageId};
