use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::UnicodeWidthChar;

use crate::app::App;

const HEADING: &str = "How can I help you ?";
const PLACEHOLDER: &str = "Ask your assistant...";
const PENDING_PLACEHOLDER: &str = "Waiting for response...";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: heading, transcript, input, status bar
    let [heading_area, transcript_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_heading(frame, heading_area);
    render_transcript(app, frame, transcript_area);
    render_input(app, frame, input_area);
    render_status(app, frame, status_area);
}

fn render_heading(frame: &mut Frame, area: Rect) {
    let heading = Paragraph::new(Line::from(Span::styled(
        HEADING,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(heading, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Last column is reserved for the scrollbar
    let [text_area, scrollbar_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    app.resize_transcript(text_area.width, text_area.height);

    let scroll = app.effective_scroll();
    let mut lines = app.transcript_window(scroll, text_area.height as usize);
    // Short transcripts sit at the bottom, just above the input
    let padding = (text_area.height as usize).saturating_sub(lines.len());
    if padding > 0 {
        let mut padded = vec![Line::default(); padding];
        padded.append(&mut lines);
        lines = padded;
    }

    frame.render_widget(Paragraph::new(lines), text_area);

    let mut scrollbar_state = ScrollbarState::new(app.max_scroll()).position(scroll);
    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(None)
        .end_symbol(None);
    frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_view(&app.input, app.input_cursor, inner_width);

    let input = if !enabled {
        Paragraph::new(Span::styled(
            PENDING_PLACEHOLDER,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if app.input.is_empty() {
        Paragraph::new(Span::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);

    if enabled {
        frame.set_cursor_position((area.x + cursor_x as u16 + 1, area.y + 1));
    }
}

/// Slice of `input` that fits in `width` cells with the cursor visible, and
/// the cursor's column within it. Widths are display cells, so wide
/// characters count double.
fn input_view(input: &str, cursor: usize, width: usize) -> (String, usize) {
    if width == 0 {
        return (String::new(), 0);
    }

    // Drop leading characters until the cursor cell fits in the box
    let before: Vec<char> = input.chars().take(cursor).collect();
    let mut skip = 0;
    let mut cursor_x: usize = before.iter().map(|c| c.width().unwrap_or(0)).sum();
    while cursor_x >= width && skip < before.len() {
        cursor_x -= before[skip].width().unwrap_or(0);
        skip += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in input.chars().skip(skip) {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        visible.push(c);
        used += w;
    }
    (visible, cursor_x)
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let state = if app.input_enabled() {
        Span::styled(" Ready ", Style::default().fg(Color::Black).bg(Color::Green))
    } else {
        Span::styled(" Waiting ", Style::default().fg(Color::Black).bg(Color::Yellow))
    };

    let status = Line::from(vec![
        state,
        Span::styled(format!(" {} ", app.model), Style::default().fg(Color::Cyan)),
        Span::styled(
            "│ Enter send · PgUp/PgDn scroll · Esc quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(status).style(Style::default().bg(Color::Black)), area);
}
