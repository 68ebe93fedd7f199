use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::bubble::{Bubble, WrapMode};
use crate::conversation::Conversation;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub conversation: Conversation,
    pub model: String,

    // Input line
    pub input: String,
    pub input_cursor: usize,

    // Transcript view
    pub bubbles: Vec<Bubble>,
    pub wrap_mode: WrapMode,
    pub transcript_width: u16,
    pub transcript_height: u16,
    pub scroll: usize,
    /// Keep the newest bubble in view until the user scrolls away.
    pub follow_tail: bool,

    // Animation state for the pending-reply indicator
    pub animation_frame: u8,
}

impl App {
    pub fn new(conversation: Conversation, model: String, wrap_mode: WrapMode) -> Self {
        Self {
            should_quit: false,
            conversation,
            model,
            input: String::new(),
            input_cursor: 0,
            bubbles: Vec::new(),
            wrap_mode,
            transcript_width: 0,
            transcript_height: 0,
            scroll: 0,
            follow_tail: true,
            animation_frame: 0,
        }
    }

    pub fn input_enabled(&self) -> bool {
        self.conversation.input_enabled()
    }

    /// Submit the input line as a new turn. The line is only cleared if the
    /// conversation accepted it.
    pub fn submit_input(&mut self) {
        if self.conversation.submit(&self.input) {
            self.input.clear();
            self.input_cursor = 0;
            self.animation_frame = 0;
            self.sync_bubbles();
        }
    }

    pub fn deliver_reply(&mut self, reply: String) {
        self.conversation.deliver(reply);
        self.sync_bubbles();
    }

    /// Build bubbles for transcript entries that don't have one yet.
    fn sync_bubbles(&mut self) {
        let start = self.bubbles.len();
        for message in &self.conversation.transcript()[start..] {
            self.bubbles
                .push(Bubble::new(message, self.wrap_mode, self.transcript_width));
        }
        self.follow_tail = true;
    }

    /// Re-wrap every bubble for a new transcript width.
    pub fn resize_transcript(&mut self, width: u16, height: u16) {
        self.transcript_height = height;
        if width != self.transcript_width {
            self.transcript_width = width;
            for bubble in &mut self.bubbles {
                bubble.resize(width);
            }
        }
    }

    pub fn tick_animation(&mut self) {
        if self.conversation.awaiting_response() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// The pending-reply indicator rows: a spacer after the last bubble, then
    /// the animated "Thinking" line.
    fn indicator_lines(&self) -> Vec<Line<'static>> {
        if !self.conversation.awaiting_response() {
            return Vec::new();
        }
        let mut lines = Vec::with_capacity(2);
        if !self.bubbles.is_empty() {
            lines.push(Line::default());
        }
        let dots = ".".repeat(self.animation_frame as usize + 1);
        lines.push(Line::from(vec![
            Span::styled("◆ ", Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]));
        lines
    }

    /// Transcript rows `start..start + rows`: bubbles separated by a blank row,
    /// then the pending-reply indicator. Bubbles outside the window are never
    /// laid out.
    pub fn transcript_window(&self, start: usize, rows: usize) -> Vec<Line<'static>> {
        let end = start.saturating_add(rows);
        let mut lines: Vec<Line<'static>> = Vec::new();
        let mut top = 0usize;

        for (i, bubble) in self.bubbles.iter().enumerate() {
            if top >= end {
                return lines;
            }
            if i > 0 {
                if top >= start {
                    lines.push(Line::default());
                }
                top += 1;
            }
            let height = bubble.height();
            if top + height > start && top < end {
                let skip = start.saturating_sub(top);
                let take = end - top.max(start);
                lines.extend(bubble.lines().into_iter().skip(skip).take(take));
            }
            top += height;
        }

        for line in self.indicator_lines() {
            if top >= start && top < end {
                lines.push(line);
            }
            top += 1;
        }
        lines
    }

    pub fn total_transcript_lines(&self) -> usize {
        let bubbles: usize = self.bubbles.iter().map(Bubble::height).sum();
        let gaps = self.bubbles.len().saturating_sub(1);
        let indicator = match (self.conversation.awaiting_response(), self.bubbles.is_empty()) {
            (false, _) => 0,
            (true, true) => 1,
            (true, false) => 2,
        };
        bubbles + gaps + indicator
    }

    pub fn max_scroll(&self) -> usize {
        self.total_transcript_lines()
            .saturating_sub(self.transcript_height as usize)
    }

    /// Scroll offset to draw with, honouring tail-following.
    pub fn effective_scroll(&self) -> usize {
        if self.follow_tail {
            self.max_scroll()
        } else {
            self.scroll.min(self.max_scroll())
        }
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.effective_scroll().saturating_sub(rows);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, rows: usize) {
        let max = self.max_scroll();
        self.scroll = self.effective_scroll().saturating_add(rows).min(max);
        self.follow_tail = self.scroll >= max;
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.follow_tail = self.max_scroll() == 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    pub fn half_page(&self) -> usize {
        (self.transcript_height as usize / 2).max(1)
    }

    // Input editing. All of these are no-ops while a reply is pending.

    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn backspace(&mut self) {
        if !self.input_enabled() || self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.input_enabled() {
            return;
        }
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }
}
