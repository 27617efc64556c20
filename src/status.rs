use crate::events::AppEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

/// Phrases shown while a reply is pending, in display order
pub const DEFAULT_PHRASES: [&str; 4] = [
    "Analyzing query",
    "Routing to specialist",
    "Searching database",
    "Generating response",
];

pub const DEFAULT_INTERVAL_MS: u64 = 1200;

/// Cycles through a fixed list of phrases
#[derive(Debug, Clone)]
pub struct StatusRotation {
    phrases: Vec<String>,
    index: usize,
}

impl StatusRotation {
    /// Falls back to [`DEFAULT_PHRASES`] when `phrases` is empty
    pub fn new(phrases: Vec<String>) -> Self {
        let phrases = if phrases.is_empty() {
            DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect()
        } else {
            phrases
        };
        Self { phrases, index: 0 }
    }

    pub fn current(&self) -> &str {
        &self.phrases[self.index]
    }

    /// Move to the next phrase, wrapping around
    pub fn advance(&mut self) -> &str {
        self.index = (self.index + 1) % self.phrases.len();
        self.current()
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

impl Default for StatusRotation {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Repeating timer that posts [`AppEvent::StatusTick`] until dropped.
///
/// The first tick fires one full period after start. Dropping the timer
/// aborts its task; ticks already queued still carry the old epoch, so the
/// receiver can tell them apart.
#[derive(Debug)]
pub struct StatusTimer {
    epoch: u64,
    task: JoinHandle<()>,
}

impl StatusTimer {
    pub fn start(epoch: u64, period: Duration, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(AppEvent::StatusTick { epoch }).is_err() {
                    break;
                }
            }
        });

        Self { epoch, task }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for StatusTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
