use thiserror::Error;

/// Input rejected before anything is sent to the service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    Empty,

    #[error("message is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// A single request/response cycle with the chat service failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Connection refused, timeout, TLS failure and friends
    #[error("request failed: {cause}")]
    Transport { cause: String },

    /// The service answered with a non-2xx status
    #[error("service returned {status}: {cause}")]
    Status { status: u16, cause: String },

    /// 2xx, but the body was not the reply we expect
    #[error("malformed response: {cause}")]
    Decode { cause: String },
}

impl ExchangeError {
    pub fn cause(&self) -> &str {
        match self {
            ExchangeError::Transport { cause }
            | ExchangeError::Status { cause, .. }
            | ExchangeError::Decode { cause } => cause,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::Decode { cause: err.to_string() }
        } else {
            ExchangeError::Transport { cause: err.to_string() }
        }
    }
}

/// Invalid mutation of the conversation state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("conversation id is already {current}, refusing to replace it with {offered}")]
    AlreadySet { current: String, offered: String },
}
