use crate::events::AppEvent;
use crate::status::{StatusRotation, StatusTimer};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// "Typing" line shown while a reply is pending
#[derive(Debug)]
pub struct TypingIndicator {
    rotation: StatusRotation,
    period: Duration,
    timer: Option<StatusTimer>,
    epoch: u64,
}

impl TypingIndicator {
    pub fn new(phrases: Vec<String>, period: Duration) -> Self {
        Self {
            rotation: StatusRotation::new(phrases),
            period,
            timer: None,
            epoch: 0,
        }
    }

    /// Show the indicator from the first phrase and start rotating
    pub fn start(&mut self, tx: mpsc::UnboundedSender<AppEvent>) {
        self.epoch += 1;
        self.rotation.reset();
        self.timer = Some(StatusTimer::start(self.epoch, self.period, tx));
    }

    /// Hide the indicator and release its timer
    pub fn stop(&mut self) {
        self.timer = None;
    }

    /// Apply a timer tick. Returns whether the phrase changed; ticks from a
    /// released timer never do.
    pub fn on_tick(&mut self, epoch: u64) -> bool {
        match &self.timer {
            Some(timer) if timer.epoch() == epoch => {
                self.rotation.advance();
                true
            }
            _ => {
                tracing::debug!(epoch, current = self.epoch, "Ignoring stale status tick");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Phrase on screen, if the indicator is showing
    pub fn current_phrase(&self) -> Option<&str> {
        self.timer.as_ref().map(|_| self.rotation.current())
    }
}

impl Widget for &TypingIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(phrase) = self.current_phrase() else {
            return;
        };
        if area.height == 0 {
            return;
        }

        let indicator = Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled(format!("{}...", phrase), Style::default().fg(Color::Gray)),
        ]);
        buf.set_line(area.x, area.y, &indicator, area.width);
    }
}
