//! Chat bubbles: word-wrapped, auto-height blocks of terminal lines.

use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::conversation::{Message, Origin};
use crate::markup;

/// Columns a bubble gives up to the avatar and the gap on the opposite side.
pub const BUBBLE_MARGIN: u16 = 6;

const AVATAR_WIDTH: u16 = 2;
// Border plus one column of padding on each side.
const FRAME_WIDTH: u16 = 4;
const FRAME_HEIGHT: usize = 2;
// Terminal cells are monospaced.
const AVG_CHAR_WIDTH: u16 = 1;

const ASSISTANT_AVATAR: &str = "◆";
const USER_AVATAR: &str = "●";

/// How a bubble lays out its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Interpret display markup and wrap styled spans by measured width.
    Markup,
    /// Wrap the raw text at an approximate character budget.
    Plain,
}

/// Approximate how many characters fit on a line of `available_width`.
///
/// Only used when plain-text layout is in effect: the budget is the width in
/// average characters, reduced by a third and offset by five.
pub fn char_budget(available_width: u16, avg_char_width: u16) -> usize {
    let budget = f64::from(available_width / avg_char_width.max(1));
    (budget - budget / 3.0 + 5.0) as usize
}

#[derive(Debug, Clone)]
pub struct Bubble {
    origin: Origin,
    text: String,
    mode: WrapMode,
    content: Vec<Line<'static>>,
    content_width: u16,
    wrapped: Vec<Line<'static>>,
}

impl Bubble {
    pub fn new(message: &Message, mode: WrapMode, container_width: u16) -> Self {
        let content = match mode {
            WrapMode::Markup => markup::parse_markup(message.rendered_markup()),
            WrapMode::Plain => Vec::new(),
        };
        let mut bubble = Self {
            origin: message.origin(),
            text: message.text().to_string(),
            mode,
            content,
            content_width: container_width.saturating_sub(BUBBLE_MARGIN),
            wrapped: Vec::new(),
        };
        bubble.rewrap();
        bubble
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Width of the bubble box, excluding the avatar column and margin.
    pub fn content_width(&self) -> u16 {
        self.content_width
    }

    /// Width available to text inside the frame.
    pub fn text_width(&self) -> u16 {
        self.content_width.saturating_sub(FRAME_WIDTH).max(1)
    }

    /// Rows the bubble occupies at its current width.
    pub fn height(&self) -> usize {
        self.wrapped.len() + FRAME_HEIGHT
    }

    /// Recompute the width for a new container width and re-wrap.
    pub fn resize(&mut self, container_width: u16) {
        let width = container_width.saturating_sub(BUBBLE_MARGIN);
        if width != self.content_width {
            self.content_width = width;
            self.rewrap();
        }
    }

    fn rewrap(&mut self) {
        let text_width = self.text_width() as usize;
        self.wrapped = match self.mode {
            WrapMode::Markup => self
                .content
                .iter()
                .flat_map(|line| wrap_line(line, text_width))
                .collect(),
            WrapMode::Plain => {
                let budget = char_budget(self.text_width(), AVG_CHAR_WIDTH).clamp(1, text_width);
                textwrap::wrap(&self.text, budget)
                    .into_iter()
                    .map(|line| Line::from(line.into_owned()))
                    .collect()
            }
        };
    }

    /// The framed bubble, one entry per row, including the avatar column.
    pub fn lines(&self) -> Vec<Line<'static>> {
        let (border, background) = match self.origin {
            Origin::Assistant => (Color::Cyan, Color::Rgb(18, 42, 58)),
            Origin::User => (Color::Gray, Color::Rgb(52, 52, 52)),
        };
        let border_style = Style::default().fg(border);
        let fill = Style::default().bg(background);
        let inner = self.content_width.saturating_sub(2) as usize;
        let text_width = self.text_width() as usize;

        let mut rows: Vec<Vec<Span<'static>>> = Vec::with_capacity(self.wrapped.len() + 2);
        rows.push(vec![Span::styled(format!("╭{}╮", "─".repeat(inner)), border_style)]);
        for line in &self.wrapped {
            let used = line.width();
            let mut row = vec![Span::styled("│", border_style), Span::styled(" ", fill)];
            row.extend(
                line.spans
                    .iter()
                    .map(|span| Span::styled(span.content.clone(), fill.patch(span.style))),
            );
            row.push(Span::styled(" ".repeat(text_width.saturating_sub(used) + 1), fill));
            row.push(Span::styled("│", border_style));
            rows.push(row);
        }
        rows.push(vec![Span::styled(format!("╰{}╯", "─".repeat(inner)), border_style)]);

        rows.into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                // Avatar sits beside the first row of text.
                let avatar = if i == 1 {
                    let glyph = match self.origin {
                        Origin::Assistant => ASSISTANT_AVATAR,
                        Origin::User => USER_AVATAR,
                    };
                    Span::styled(glyph, border_style)
                } else {
                    Span::raw(" ")
                };
                match self.origin {
                    Origin::Assistant => {
                        row.insert(0, Span::raw(" "));
                        row.insert(0, avatar);
                    }
                    Origin::User => {
                        let gap = (BUBBLE_MARGIN - AVATAR_WIDTH) as usize;
                        row.insert(0, Span::raw(" ".repeat(gap)));
                        row.push(Span::raw(" "));
                        row.push(avatar);
                    }
                }
                Line::from(row)
            })
            .collect()
    }
}

struct Token<'a> {
    pieces: Vec<(&'a str, Style)>,
    width: usize,
    space: bool,
}

/// Split a line into alternating runs of whitespace and non-whitespace,
/// joining runs that continue across span boundaries.
fn tokenize<'a>(line: &'a Line<'static>) -> Vec<Token<'a>> {
    let mut tokens: Vec<Token<'a>> = Vec::new();
    for span in &line.spans {
        let text = span.content.as_ref();
        let mut start = 0;
        for (i, c) in text.char_indices() {
            let space = c.is_whitespace();
            let next = text[i + c.len_utf8()..].chars().next();
            if next.map(char::is_whitespace) != Some(space) {
                let piece = &text[start..i + c.len_utf8()];
                match tokens.last_mut() {
                    Some(last) if last.space == space && start == 0 => {
                        last.pieces.push((piece, span.style));
                        last.width += piece.width();
                    }
                    _ => tokens.push(Token {
                        pieces: vec![(piece, span.style)],
                        width: piece.width(),
                        space,
                    }),
                }
                start = i + c.len_utf8();
            }
        }
    }
    tokens
}

fn push_piece(spans: &mut Vec<Span<'static>>, text: &str, style: Style) {
    match spans.last_mut() {
        Some(last) if last.style == style => last.content.to_mut().push_str(text),
        _ => spans.push(Span::styled(text.to_string(), style)),
    }
}

fn finish_row(mut spans: Vec<Span<'static>>) -> Line<'static> {
    while let Some(last) = spans.last_mut() {
        let trimmed = last.content.trim_end().len();
        if trimmed == 0 {
            spans.pop();
        } else {
            last.content.to_mut().truncate(trimmed);
            break;
        }
    }
    Line::from(spans)
}

/// Greedy word wrap of one styled line to `width` columns.
///
/// Whitespace is kept inside a row and dropped where a row breaks. Words wider
/// than a whole row are broken between characters.
fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for token in tokenize(line) {
        if token.space {
            if used + token.width > width {
                if used > 0 {
                    rows.push(finish_row(std::mem::take(&mut current)));
                    used = 0;
                }
                continue;
            }
            if used == 0 && !rows.is_empty() {
                continue;
            }
        } else if used + token.width > width && used > 0 {
            rows.push(finish_row(std::mem::take(&mut current)));
            used = 0;
        }

        if used + token.width <= width {
            for (text, style) in &token.pieces {
                push_piece(&mut current, text, *style);
            }
            used += token.width;
            continue;
        }

        for (text, style) in &token.pieces {
            for c in text.chars() {
                let w = c.width().unwrap_or(0);
                if used + w > width && used > 0 {
                    rows.push(finish_row(std::mem::take(&mut current)));
                    used = 0;
                }
                let mut buf = [0u8; 4];
                push_piece(&mut current, c.encode_utf8(&mut buf), *style);
                used += w;
            }
        }
    }

    rows.push(finish_row(current));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    fn row_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn wrapped_texts(bubble: &Bubble) -> Vec<String> {
        bubble.wrapped.iter().map(row_text).collect()
    }

    #[test]
    fn test_char_budget_formula() {
        // 60 - 20 + 5
        assert_eq!(char_budget(60, 1), 45);
        // 10 - 3.33 + 5, truncated
        assert_eq!(char_budget(10, 1), 11);
        assert_eq!(char_budget(70, 7), 11);
        assert_eq!(char_budget(0, 0), 5);
    }

    #[test]
    fn test_resize_updates_width_not_text() {
        let message = Message::assistant("some words to wrap around");
        let mut bubble = Bubble::new(&message, WrapMode::Markup, 80);
        assert_eq!(bubble.content_width(), 80 - BUBBLE_MARGIN);

        bubble.resize(30);
        assert_eq!(bubble.content_width(), 30 - BUBBLE_MARGIN);
        assert_eq!(bubble.text(), "some words to wrap around");
    }

    #[test]
    fn test_height_tracks_wrapped_content() {
        let message = Message::assistant("alpha beta gamma delta");
        let mut bubble = Bubble::new(&message, WrapMode::Markup, 80);
        assert_eq!(bubble.height(), 1 + FRAME_HEIGHT);

        // text width = 20 - 6 - 4 = 10
        bubble.resize(20);
        assert_eq!(wrapped_texts(&bubble), vec!["alpha beta", "gamma", "delta"]);
        assert_eq!(bubble.height(), 3 + FRAME_HEIGHT);

        bubble.resize(80);
        assert_eq!(bubble.height(), 1 + FRAME_HEIGHT);
    }

    #[test]
    fn test_line_breaks_add_rows() {
        let message = Message::assistant("one\ntwo\n\nthree");
        let bubble = Bubble::new(&message, WrapMode::Markup, 80);
        assert_eq!(wrapped_texts(&bubble), vec!["one", "two", "", "three"]);
    }

    #[test]
    fn test_wrap_keeps_styles_across_rows() {
        let message = Message::assistant("**bold words here** tail");
        // text width = 16 - 6 - 4 = 6
        let bubble = Bubble::new(&message, WrapMode::Markup, 16);
        assert_eq!(wrapped_texts(&bubble), vec!["bold", "words", "here", "tail"]);
        let first = &bubble.wrapped[0].spans[0];
        assert!(first.style.add_modifier.contains(Modifier::BOLD));
        let last = &bubble.wrapped[3].spans[0];
        assert!(!last.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_long_word_is_broken() {
        let message = Message::user("abcdefghij");
        // text width = 14 - 6 - 4 = 4
        let bubble = Bubble::new(&message, WrapMode::Markup, 14);
        assert_eq!(wrapped_texts(&bubble), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_interior_whitespace_kept() {
        let message = Message::assistant("a   b");
        let bubble = Bubble::new(&message, WrapMode::Markup, 80);
        assert_eq!(wrapped_texts(&bubble), vec!["a   b"]);
    }

    #[test]
    fn test_user_text_asterisks_are_literal() {
        let message = Message::user("*not italic*");
        let bubble = Bubble::new(&message, WrapMode::Markup, 80);
        assert_eq!(wrapped_texts(&bubble), vec!["*not italic*"]);
    }

    #[test]
    fn test_plain_mode_uses_char_budget() {
        let message = Message::assistant("aaa bbb ccc ddd eee");
        // text width 24 -> budget 21, no wrap needed beyond it
        let bubble = Bubble::new(&message, WrapMode::Plain, 34);
        assert_eq!(wrapped_texts(&bubble), vec!["aaa bbb ccc ddd eee"]);
        // text width 6 -> budget 9, clamped to 6
        let narrow = Bubble::new(&message, WrapMode::Plain, 16);
        assert_eq!(wrapped_texts(&narrow), vec!["aaa", "bbb", "ccc", "ddd", "eee"]);
    }

    #[test]
    fn test_rows_are_uniform_width() {
        let assistant = Bubble::new(&Message::assistant("hi"), WrapMode::Markup, 30);
        let user = Bubble::new(&Message::user("hi"), WrapMode::Markup, 30);

        let rows = assistant.lines();
        assert_eq!(rows.len(), assistant.height());
        for row in &rows {
            assert_eq!(row.width() as u16, assistant.content_width() + AVATAR_WIDTH);
        }

        // User bubbles are pushed right, against the container edge.
        let rows = user.lines();
        assert_eq!(rows.len(), user.height());
        for row in &rows {
            assert_eq!(row.width(), 30);
        }
    }

    #[test]
    fn test_avatar_side_mirrors_origin() {
        let assistant = Bubble::new(&Message::assistant("hi"), WrapMode::Markup, 30);
        let user = Bubble::new(&Message::user("hi"), WrapMode::Markup, 30);
        assert!(row_text(&assistant.lines()[1]).starts_with(ASSISTANT_AVATAR));
        assert!(row_text(&user.lines()[1]).ends_with(USER_AVATAR));
    }
}
