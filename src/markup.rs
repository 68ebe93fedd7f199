//! Lightweight emphasis markup.
//!
//! Completion text uses `**bold**` and `*italic*` runs. [`to_markup`] turns it
//! into a tiny display markup (`<b>`, `<i>`, `<br>` plus four entities) and
//! [`parse_markup`] turns that markup into styled terminal lines.

use std::sync::OnceLock;

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use regex::Regex;

pub const LINE_BREAK: &str = "<br>";

const TAGS: [(&str, Tag); 5] = [
    ("<b>", Tag::Bold(true)),
    ("</b>", Tag::Bold(false)),
    ("<i>", Tag::Italic(true)),
    ("</i>", Tag::Italic(false)),
    (LINE_BREAK, Tag::Break),
];

const ENTITIES: [(&str, char); 4] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Bold(bool),
    Italic(bool),
    Break,
}

fn bold_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

fn italic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("italic pattern is valid"))
}

/// Escape the characters the display markup reserves.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn convert_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', LINE_BREAK)
}

/// Convert completion text into display markup.
///
/// Double markers are consumed before single ones so the outer asterisks of a
/// bold run are never read as italics. Emphasis never spans a line break.
pub fn to_markup(text: &str) -> String {
    let escaped = escape(text);
    let bold = bold_pattern().replace_all(&escaped, "<b>$1</b>");
    let italic = italic_pattern().replace_all(&bold, "<i>$1</i>");
    convert_line_breaks(&italic)
}

/// Markup for text shown verbatim: escaped, with line breaks, no emphasis.
pub fn plain_markup(text: &str) -> String {
    convert_line_breaks(&escape(text))
}

fn match_tag(rest: &str) -> Option<(Tag, usize)> {
    TAGS.iter()
        .find(|(literal, _)| rest.starts_with(literal))
        .map(|(literal, tag)| (*tag, literal.len()))
}

fn match_entity(rest: &str) -> Option<(char, usize)> {
    ENTITIES
        .iter()
        .find(|(literal, _)| rest.starts_with(literal))
        .map(|(literal, c)| (*c, literal.len()))
}

fn flush(spans: &mut Vec<Span<'static>>, current: &mut String, style: Style) {
    if !current.is_empty() {
        spans.push(Span::styled(std::mem::take(current), style));
    }
}

/// Interpret display markup as styled lines, one per `<br>`-separated line.
///
/// Opening and closing tags set and clear their modifier rather than nest, so
/// mis-nested output such as `<b><i>x</b></i>` still renders.
pub fn parse_markup(markup: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut style = Style::default();
    let mut rest = markup;

    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some((tag, len)) = match_tag(rest) {
                flush(&mut spans, &mut current, style);
                match tag {
                    Tag::Bold(true) => style = style.add_modifier(Modifier::BOLD),
                    Tag::Bold(false) => style = style.remove_modifier(Modifier::BOLD),
                    Tag::Italic(true) => style = style.add_modifier(Modifier::ITALIC),
                    Tag::Italic(false) => style = style.remove_modifier(Modifier::ITALIC),
                    Tag::Break => lines.push(Line::from(std::mem::take(&mut spans))),
                }
                rest = &rest[len..];
                continue;
            }
        } else if c == '&' {
            if let Some((unescaped, len)) = match_entity(rest) {
                current.push(unescaped);
                rest = &rest[len..];
                continue;
            }
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }

    flush(&mut spans, &mut current, style);
    lines.push(Line::from(spans));
    lines
}
