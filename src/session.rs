//! Conversation state: the ordered message log and the server-issued
//! conversation id. All mutations go through [`ConversationSession`], which
//! notifies subscribed [`LogObserver`]s after every append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use crate::error::ConversationError;
use crate::events::MessageRole;

/// Opaque message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh id for a message written on this side of the wire
    pub fn local() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued token tying several turns into one conversation.
/// There is deliberately no way to mint one locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single entry in the message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub agent_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Receives every append to the message log, synchronously
pub trait LogObserver {
    fn on_append(&mut self, message: &Message, log_len: usize);
}

/// Handle returned by [`ConversationSession::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owns the message log and the conversation id
#[derive(Default)]
pub struct ConversationSession {
    messages: Vec<Message>,
    conversation_id: Option<ConversationId>,
    observers: Vec<(SubscriptionId, Box<dyn LogObserver>)>,
    next_subscription: u64,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message with a fresh local id
    pub fn append_user_message(&mut self, text: impl Into<String>) -> Message {
        let message = Message {
            id: MessageId::local(),
            role: MessageRole::User,
            content: text.into(),
            agent_type: None,
            created_at: Utc::now(),
        };
        self.push(message)
    }

    /// Append an assistant message under the id the server gave it
    pub fn append_assistant_message(
        &mut self,
        server_message_id: MessageId,
        text: impl Into<String>,
        agent_type: Option<String>,
    ) -> Message {
        let message = Message {
            id: server_message_id,
            role: MessageRole::Assistant,
            content: text.into(),
            agent_type,
            created_at: Utc::now(),
        };
        self.push(message)
    }

    /// Set the conversation id. Offering the current id again is a no-op;
    /// offering a different one once set is refused.
    pub fn adopt_conversation_id(&mut self, id: ConversationId) -> Result<(), ConversationError> {
        match &self.conversation_id {
            None => {
                tracing::info!(conversation_id = %id, "Adopted conversation id");
                self.conversation_id = Some(id);
                Ok(())
            }
            Some(current) if *current == id => Ok(()),
            Some(current) => Err(ConversationError::AlreadySet {
                current: current.to_string(),
                offered: id.to_string(),
            }),
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// The log in insertion order. The iterator is `Clone`, so a renderer
    /// can walk it as many times as it needs.
    pub fn messages(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn subscribe(&mut self, observer: Box<dyn LogObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    fn push(&mut self, message: Message) -> Message {
        self.messages.push(message.clone());
        let len = self.messages.len();
        for (_, observer) in self.observers.iter_mut() {
            observer.on_append(&message, len);
        }
        message
    }
}

/// Marks the screen dirty whenever the log grows
#[derive(Debug, Clone, Default)]
pub struct RedrawFlag(Rc<Cell<bool>>);

impl RedrawFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.set(true);
    }

    /// Read and clear
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

impl LogObserver for RedrawFlag {
    fn on_append(&mut self, _message: &Message, _log_len: usize) {
        self.mark();
    }
}

/// Emits a debug event per appended message
#[derive(Debug, Default)]
pub struct TranscriptTracer;

impl LogObserver for TranscriptTracer {
    fn on_append(&mut self, message: &Message, log_len: usize) {
        tracing::debug!(
            message_id = %message.id,
            role = ?message.role,
            agent = message.agent_type.as_deref().unwrap_or("-"),
            chars = message.content.chars().count(),
            log_len,
            "Message appended"
        );
    }
}
