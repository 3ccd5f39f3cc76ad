use super::state::*;
use crate::chart::{self, AxisTick, ChartFrame};
use crate::chat::EXAMPLE_QUESTIONS;
use crate::replay::ReplayPhase;
use crate::series::MarkerKind;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine},
        Block, Borders, Gauge, Paragraph, Tabs,
    },
    Frame,
};

const PRICE_AXIS_WIDTH: u16 = 10;
const SUPPORT_FILL: Color = Color::Indexed(22);
const RESISTANCE_FILL: Color = Color::Indexed(52);

pub fn render(f: &mut Frame, state: &AppState) {
    let banner = state.banner();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if banner.is_some() { 1 } else { 0 }),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    if let Some(b) = banner {
        let color = match b.level {
            BannerLevel::Warn => Color::Yellow,
            BannerLevel::Error => Color::Red,
        };
        let text = Paragraph::new(b.text).style(
            Style::default()
                .fg(Color::Black)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        );
        f.render_widget(text, rows[0]);
    }

    let tabs = Tabs::new(vec!["Chart Analysis", "AI Assistant"])
        .select(state.tab.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(" TSLA ", Style::default().add_modifier(Modifier::BOLD))),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, rows[1]);

    match state.tab {
        Tab::Chart => render_chart_tab(f, rows[2], state),
        Tab::Chat => render_chat_tab(f, rows[2], state),
    }

    render_status_bar(f, rows[3], state);
}

fn render_status_bar(f: &mut Frame, area: Rect, state: &AppState) {
    let keys = match state.tab {
        Tab::Chart => "Space play/pause  r reset  ←/→ seek  Home/End  +/- step  L reload  Tab chat  q quit",
        Tab::Chat => "Enter ask  Esc clear  F1-F6 examples  PgUp/PgDn scroll  Tab chart  Ctrl-C quit",
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", state.status_message),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_chart_tab(f: &mut Frame, area: Rect, state: &AppState) {
    let frame = chart::build_frame(&state.series, &state.replay, state.replay_cfg.max_visible_candles);

    let title = match state.series.summary() {
        Some(s) => format!(
            " {} | {} rows | high {:.2} low {:.2} | {} LONG {} SHORT ",
            state.source_label, s.rows, s.highest.0, s.lowest.0, s.longs, s.shorts
        ),
        None if state.source_label.is_empty() => " Price ".to_string(),
        None => format!(" {} ", state.source_label),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let progress = Gauge::default()
        .gauge_style(Style::default().fg(phase_color(state.replay.phase())))
        .ratio(state.replay.progress().clamp(0.0, 1.0))
        .label(frame.status.clone());
    f.render_widget(progress, rows[2]);

    if frame.is_empty() {
        let msg = if state.has_data() {
            "Press Space to start the replay"
        } else {
            "no data"
        };
        let p = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(p, rows[0]);
        return;
    }

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(PRICE_AXIS_WIDTH), Constraint::Min(10)])
        .split(rows[0]);
    let time_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(PRICE_AXIS_WIDTH), Constraint::Min(10)])
        .split(rows[1]);

    let price_lines: Vec<Line> = price_axis_lines(
        &frame.price_ticks,
        frame.y_bounds,
        cols[0].height as usize,
        PRICE_AXIS_WIDTH as usize - 1,
    )
    .into_iter()
    .map(|s| Line::styled(s, Style::default().fg(Color::DarkGray)))
    .collect();
    f.render_widget(Paragraph::new(price_lines), cols[0]);

    let time_line = time_axis_line(&frame.time_ticks, frame.x_bounds, time_cols[1].width as usize);
    f.render_widget(
        Paragraph::new(time_line).style(Style::default().fg(Color::DarkGray)),
        time_cols[1],
    );

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds(frame.x_bounds)
        .y_bounds(frame.y_bounds)
        .paint(|ctx| paint_chart(ctx, &frame));
    f.render_widget(canvas, cols[1]);
}

fn phase_color(phase: ReplayPhase) -> Color {
    match phase {
        ReplayPhase::Stopped => Color::Blue,
        ReplayPhase::Playing => Color::Green,
        ReplayPhase::Finished => Color::Magenta,
    }
}

fn paint_chart(ctx: &mut Context<'_>, frame: &ChartFrame) {
    // bands first so candles draw over them
    for (columns, fill, edge) in [
        (&frame.support, SUPPORT_FILL, Color::Green),
        (&frame.resistance, RESISTANCE_FILL, Color::Red),
    ] {
        for c in columns.iter() {
            ctx.draw(&CanvasLine::new(c.x, c.lower, c.x, c.upper, fill));
        }
        let outline = chart::band_polygon(columns);
        for pair in outline.windows(2) {
            let (x1, y1) = pair[0];
            let (x2, y2) = pair[1];
            if (x2 - x1).abs() <= 1.0 {
                ctx.draw(&CanvasLine::new(x1, y1, x2, y2, edge));
            }
        }
    }
    ctx.layer();

    for c in &frame.candles {
        let color = if c.bullish { Color::Green } else { Color::Red };
        ctx.draw(&CanvasLine::new(c.x, c.low, c.x, c.high, color));
        let (lo, hi) = if c.open <= c.close {
            (c.open, c.close)
        } else {
            (c.close, c.open)
        };
        for dx in [-0.3, -0.15, 0.15, 0.3] {
            ctx.draw(&CanvasLine::new(c.x + dx, lo, c.x + dx, hi, color));
        }
    }
    ctx.layer();

    for m in &frame.markers {
        let (glyph, color) = match m.kind {
            MarkerKind::Long => ("▲", Color::LightGreen),
            MarkerKind::Short => ("▼", Color::LightRed),
        };
        ctx.print(
            m.x,
            m.price,
            Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        );
    }
}

/// Right-aligned price labels, one string per terminal row. Row 0 is the
/// top of the chart.
pub fn price_axis_lines(ticks: &[AxisTick], y_bounds: [f64; 2], height: usize, width: usize) -> Vec<String> {
    let mut out = vec![String::new(); height];
    let [lo, hi] = y_bounds;
    let span = hi - lo;
    if height == 0 || span <= 0.0 {
        return out;
    }
    for t in ticks {
        let frac = (hi - t.value) / span;
        let row = (frac * (height - 1) as f64).round().clamp(0.0, (height - 1) as f64) as usize;
        out[row] = format!("{:>width$}", t.label, width = width);
    }
    out
}

/// Time labels placed under their candles, skipping any that would overlap
/// a label already placed.
pub fn time_axis_line(ticks: &[AxisTick], x_bounds: [f64; 2], width: usize) -> String {
    let mut cells = vec![' '; width];
    let [x0, x1] = x_bounds;
    if width == 0 || x1 <= x0 {
        return String::new();
    }
    let mut next_free = 0usize;
    for t in ticks {
        let label: Vec<char> = t.label.chars().collect();
        if label.len() > width {
            continue;
        }
        let col = ((t.value - x0) / (x1 - x0) * (width - 1) as f64).round().max(0.0) as usize;
        let start = col.saturating_sub(label.len() / 2).min(width - label.len());
        if start < next_free {
            continue;
        }
        cells[start..start + label.len()].copy_from_slice(&label);
        next_free = start + label.len() + 1;
    }
    cells.into_iter().collect()
}

fn render_chat_tab(f: &mut Frame, area: Rect, state: &AppState) {
    let chat = &state.chat;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(EXAMPLE_QUESTIONS.len() as u16 + 2),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let examples: Vec<Line> = match &chat.availability {
        ChatAvailability::Ready => EXAMPLE_QUESTIONS
            .iter()
            .enumerate()
            .map(|(i, q)| {
                Line::from(vec![
                    Span::styled(format!(" F{} ", i + 1), Style::default().fg(Color::Yellow)),
                    Span::raw(*q),
                ])
            })
            .collect(),
        ChatAvailability::Disabled { reason } => vec![
            Line::styled(reason.clone(), Style::default().fg(Color::Yellow)),
            Line::raw("Set the key in the environment or a .env file and restart."),
        ],
    };
    f.render_widget(
        Paragraph::new(examples).block(Block::default().borders(Borders::ALL).title(" Example questions ")),
        rows[0],
    );

    let history_block = Block::default().borders(Borders::ALL).title(" Conversation ");
    let inner = history_block.inner(rows[1]);
    let lines = history_lines(chat, inner.width.max(1) as usize);
    let height = inner.height as usize;
    let bottom = lines.len().saturating_sub(height);
    let top = bottom.saturating_sub(chat.scroll_back as usize);
    let visible: Vec<Line> = lines.into_iter().skip(top).take(height).collect();
    f.render_widget(Paragraph::new(visible).block(history_block), rows[1]);

    let (input_title, input_style) = if chat.is_enabled() {
        (" Ask about the data ", Style::default())
    } else {
        (" Chat disabled ", Style::default().fg(Color::DarkGray))
    };
    let input = Paragraph::new(format!("> {}", chat.input))
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, rows[2]);
}

fn history_lines(chat: &ChatPanel, width: usize) -> Vec<Line<'static>> {
    let mut out = Vec::new();
    for entry in &chat.history {
        let (prefix, style) = match entry.role {
            ChatRole::User => ("You: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ChatRole::Assistant => ("AI: ", Style::default()),
            ChatRole::Error => ("", Style::default().fg(Color::Red)),
            ChatRole::Notice => ("", Style::default().fg(Color::DarkGray)),
        };
        let text = format!("{prefix}{}", entry.text);
        for l in wrap_text(&text, width) {
            out.push(Line::styled(l, style));
        }
        out.push(Line::raw(""));
    }
    if chat.pending.is_some() {
        out.push(Line::styled(
            "Analyzing...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ));
    }
    out
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        let mut len = 0usize;
        for word in para.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if len > 0 {
                    out.push(std::mem::take(&mut line));
                    len = 0;
                }
                let rest = word.split_off(width);
                out.push(word.into_iter().collect());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }
            let needed = if len == 0 { word.len() } else { len + 1 + word.len() };
            if needed > width {
                out.push(std::mem::take(&mut line));
                len = 0;
            }
            if len > 0 {
                line.push(' ');
                len += 1;
            }
            line.extend(word.iter());
            len += word.len();
        }
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(value: f64, label: &str) -> AxisTick {
        AxisTick {
            value,
            label: label.to_string(),
        }
    }

    #[test]
    fn price_labels_land_top_to_bottom() {
        let ticks = vec![tick(100.0, "100"), tick(150.0, "150"), tick(200.0, "200")];
        let lines = price_axis_lines(&ticks, [100.0, 200.0], 5, 6);
        assert_eq!(lines[0], "   200");
        assert_eq!(lines[2], "   150");
        assert_eq!(lines[4], "   100");
        assert_eq!(lines[1], "");
    }

    #[test]
    fn time_labels_skip_overlaps() {
        let ticks = vec![tick(0.0, "2024-01-01"), tick(1.0, "2024-01-02"), tick(10.0, "2024-01-11")];
        let line = time_axis_line(&ticks, [0.0, 10.0], 40);
        assert_eq!(line.chars().count(), 40);
        assert!(line.starts_with("2024-01-01"));
        assert!(!line.contains("2024-01-02"));
        assert!(line.ends_with("2024-01-11"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        for l in &lines {
            assert!(l.chars().count() <= 10);
        }
    }

    #[test]
    fn wrap_splits_long_words_and_keeps_paragraphs() {
        let lines = wrap_text("abcdefghij\n\nok", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "", "ok"]);
    }

    #[test]
    fn pending_question_shows_analyzing() {
        let mut chat = ChatPanel::new(ChatAvailability::Ready, None);
        chat.push(ChatRole::User, "hi", Some(1));
        chat.pending = Some(1);
        let lines = history_lines(&chat, 40);
        let last = lines.last().unwrap();
        assert_eq!(last.to_string(), "Analyzing...");
    }
}
