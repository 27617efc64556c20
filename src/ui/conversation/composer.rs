use crate::ui::conversation::commands::{
    command_entries, parse_slash_command, CommandEntry, SlashCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(SlashCommand),
    None,
}

/// State for the text area within the composer.
/// `cursor_position` is a byte offset that always sits on a char boundary.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor_position: usize,
}

impl TextAreaState {
    fn insert_str(&mut self, text: &str) {
        self.content.insert_str(self.cursor_position, text);
        self.cursor_position += text.len();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.content[..self.cursor_position].char_indices().next_back().map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.content[self.cursor_position..]
            .chars()
            .next()
            .map(|c| self.cursor_position + c.len_utf8())
    }

    fn clear(&mut self) {
        self.content.clear();
        self.cursor_position = 0;
    }
}

/// Single input box at the bottom of the screen
pub struct ConversationComposer {
    state: RefCell<TextAreaState>,
    placeholder: String,
    disabled: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            placeholder: placeholder.into(),
            disabled: false,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input. Every key is ignored while disabled.
    pub fn handle_key(&self, key: KeyEvent) -> ConversationResult {
        if self.disabled || key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        let mut state = self.state.borrow_mut();

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    state.insert_str("\n");
                } else if self.show_command_palette.get() && self.selected_command.get().is_some() {
                    let typed = state.content.trim_start_matches('/').trim().to_string();
                    let selected = self.selected_keyword();
                    // Enter on a fully typed command runs it instead of completing it
                    if selected != Some(typed.as_str()) && self.apply_selected_command(&mut state) {
                        return ConversationResult::None;
                    }
                    return self.take_submission(&mut state);
                } else if !state.content.trim().is_empty() {
                    return self.take_submission(&mut state);
                }
            }
            KeyCode::Up => {
                if self.show_command_palette.get() {
                    self.move_command_selection(-1);
                }
            }
            KeyCode::Down => {
                if self.show_command_palette.get() {
                    self.move_command_selection(1);
                }
            }
            KeyCode::Esc => {
                if self.show_command_palette.get() {
                    self.close_command_palette();
                }
            }
            KeyCode::Tab => {
                if self.show_command_palette.get() {
                    self.apply_selected_command(&mut state);
                }
            }
            KeyCode::Char(c) => {
                let mut buf = [0u8; 4];
                state.insert_str(c.encode_utf8(&mut buf));
                self.sync_command_palette(&state);
            }
            KeyCode::Backspace => {
                if let Some(prev) = state.prev_boundary() {
                    let at = state.cursor_position;
                    state.content.replace_range(prev..at, "");
                    state.cursor_position = prev;
                    self.sync_command_palette(&state);
                }
            }
            KeyCode::Delete => {
                if let Some(next) = state.next_boundary() {
                    let at = state.cursor_position;
                    state.content.replace_range(at..next, "");
                    self.sync_command_palette(&state);
                }
            }
            KeyCode::Left => {
                if let Some(prev) = state.prev_boundary() {
                    state.cursor_position = prev;
                }
            }
            KeyCode::Right => {
                if let Some(next) = state.next_boundary() {
                    state.cursor_position = next;
                }
            }
            KeyCode::Home => {
                state.cursor_position = 0;
            }
            KeyCode::End => {
                state.cursor_position = state.content.len();
            }
            _ => {}
        }

        ConversationResult::None
    }

    /// Insert pasted text at the cursor
    pub fn handle_paste(&self, text: &str) {
        if self.disabled {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.insert_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
        self.sync_command_palette(&state);
    }

    /// Commands are consumed here. A message stays in the box until the
    /// caller accepts it and calls [`ConversationComposer::clear`].
    fn take_submission(&self, state: &mut TextAreaState) -> ConversationResult {
        if state.content.trim().is_empty() {
            return ConversationResult::None;
        }
        self.close_command_palette();

        match parse_slash_command(&state.content) {
            Some(command) => {
                state.clear();
                ConversationResult::Command(command)
            }
            None => ConversationResult::Submitted(state.content.clone()),
        }
    }

    /// Open, refresh or close the palette to match the current content
    fn sync_command_palette(&self, state: &TextAreaState) {
        let is_command_prefix = state.content.starts_with('/')
            && !state.content.contains(char::is_whitespace);

        if !is_command_prefix {
            self.close_command_palette();
        } else if self.show_command_palette.get() {
            self.refresh_command_palette(state);
        } else {
            self.show_command_palette.set(true);
            self.selected_command.set(Some(0));
            self.refresh_command_palette(state);
        }
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            let clamped = index.min(filtered.len() - 1);
            self.selected_command.set(Some(clamped));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let current = self.selected_command.get().unwrap_or(0) as isize;
        let len = filtered.len() as isize;
        let next = (current + delta).rem_euclid(len);

        self.selected_command.set(Some(next as usize));
    }

    fn selected_keyword(&self) -> Option<&'static str> {
        let index = self.selected_command.get()?;
        self.filtered_commands.borrow().get(index).map(|entry| entry.keyword)
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let Some(keyword) = self.selected_keyword() else {
            return false;
        };

        state.content = format!("/{}", keyword);
        state.cursor_position = state.content.len();
        self.refresh_command_palette(state);
        true
    }

    /// Enable or disable input
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            self.close_command_palette();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Get current content
    pub fn get_content(&self) -> String {
        self.state.borrow().content.clone()
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette.get()
    }

    /// Clear content
    pub fn clear(&self) {
        self.state.borrow_mut().clear();
        self.close_command_palette();
    }

    /// Rows the palette needs above the composer, borders included
    pub fn palette_height(&self) -> u16 {
        if self.is_palette_open() {
            (self.filtered_commands.borrow().len().min(5) + 2) as u16
        } else {
            0
        }
    }

    /// Draw the slash-command palette into `area`
    pub fn render_palette(&self, area: Rect, buf: &mut Buffer) {
        if !self.is_palette_open() || area.height == 0 {
            return;
        }

        let filtered = self.filtered_commands.borrow();
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Commands")
            .style(Style::default().fg(Color::Blue));
        let inner = block.inner(area);
        block.render(area, buf);

        let selected = self.selected_command.get();
        for (index, entry) in filtered.iter().enumerate() {
            if index >= inner.height as usize {
                break;
            }

            let style = if selected == Some(index) {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled("  ", Style::default()),
                Span::styled(entry.description, Style::default().fg(Color::Gray)),
            ]);

            buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.state.borrow();

        let (title, border_style) = if self.disabled {
            ("Waiting for a reply...", Style::default().fg(Color::DarkGray))
        } else {
            ("Message", Style::default().fg(Color::Green))
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(border_style);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
            return;
        }

        let mut content = state.content.clone();
        if !self.disabled {
            content.insert(state.cursor_position.min(content.len()), '▌');
        }

        // Keep the last lines visible when the input outgrows the box
        let lines: Vec<&str> = content.split('\n').collect();
        let start = lines.len().saturating_sub(inner_area.height as usize);
        for (i, line_text) in lines[start..].iter().enumerate() {
            let line = Line::from(vec![Span::raw(*line_text)]);
            buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
        }
    }
}
