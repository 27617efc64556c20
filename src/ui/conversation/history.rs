//! Conversation history display component

use crate::events::MessageRole;
use crate::session::Message;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders the message log. Holds display settings only; the messages
/// themselves are borrowed from the session on every draw.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    show_agent_labels: bool,
    notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient text under the messages; never part of the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// One frame's worth of history, ready to be drawn
pub struct HistoryView<'a, I> {
    history: &'a ConversationHistory,
    messages: I,
}

impl ConversationHistory {
    pub fn new(show_agent_labels: bool) -> Self {
        Self {
            show_agent_labels,
            notice: None,
        }
    }

    /// Notice shown under the messages, e.g. a failed exchange or help text
    pub fn set_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice { level, text: text.into() });
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn view<'a, I>(&'a self, messages: I) -> HistoryView<'a, I>
    where
        I: Iterator<Item = &'a Message>,
    {
        HistoryView { history: self, messages }
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let timestamp = message.created_at.format("%H:%M:%S").to_string();
        let mut header = vec![
            Span::styled(
                format!("{} {} ", message.role.icon(), message.role.display_name()),
                self.get_content_style(message.role).add_modifier(Modifier::BOLD),
            ),
            Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        ];
        if self.show_agent_labels {
            if let Some(agent) = &message.agent_type {
                header.push(Span::styled(
                    format!("  Agent: {}", agent),
                    Style::default().fg(Color::Magenta),
                ));
            }
        }
        lines.push(Line::from(header));

        for content_line in wrap_text(&message.content, width.saturating_sub(2) as usize) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, self.get_content_style(message.role)),
            ]));
        }

        lines
    }

    /// Get content style based on role
    fn get_content_style(&self, role: MessageRole) -> Style {
        match role {
            MessageRole::User => Style::default().fg(Color::Blue),
            MessageRole::Assistant => Style::default().fg(Color::Green),
        }
    }
}

impl<'a, I> Widget for HistoryView<'a, I>
where
    I: Iterator<Item = &'a Message>,
{
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.messages {
            all_lines.extend(self.history.render_message(message, inner_area.width));
            // spacing between messages
            all_lines.push(Line::default());
        }

        if all_lines.is_empty() {
            all_lines = welcome_lines();
        }

        if let Some(notice) = &self.history.notice {
            let (marker, style) = match notice.level {
                NoticeLevel::Info => ("ℹ ", Style::default().fg(Color::Yellow)),
                NoticeLevel::Error => ("⚠ ", Style::default().fg(Color::Red)),
            };
            let width = inner_area.width.saturating_sub(2) as usize;
            for (i, text) in wrap_text(&notice.text, width).into_iter().enumerate() {
                let marker = if i == 0 { marker } else { "  " };
                all_lines.push(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(text, style),
                ]));
            }
        }

        // Show the tail; the newest message is always in view
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn welcome_lines() -> Vec<Line<'static>> {
    vec![
        Line::from(vec![Span::styled("Welcome!", Style::default().fg(Color::Green))]),
        Line::default(),
        Line::from(vec![Span::styled(
            "Ask me anything about orders, billing, or support.",
            Style::default().fg(Color::Gray),
        )]),
        Line::default(),
        Line::from(vec![Span::styled(
            "Press Enter to send, Shift+Enter for new line, /help for commands.",
            Style::default().fg(Color::DarkGray),
        )]),
    ]
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + word_width + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    lines
}
