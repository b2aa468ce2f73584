use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use serde_json::Value;

use crate::app::{App, InputMode};
use crate::form::{FieldValue, Form};
use crate::kind::{PrimaryKind, SecondaryKind};
use crate::model::human_age;
use crate::notice::NoticeLevel;
use crate::page::{Page, PageBody};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let layout = body_layout(root[1], app);
    app.set_viewport(layout.page_size, layout.text_height);
    let app: &App = app;

    render_header(frame, root[0], app);
    render_body(frame, &layout, app);
    render_footer(frame, root[2], app);

    if let Some(form) = app.overlay_page().and_then(Page::form) {
        render_form(frame, app, form);
    }
}

/// Where the primary table and the overlay land inside the body.
struct BodyLayout {
    summary: Option<Rect>,
    table: Option<Rect>,
    overlay: Option<Rect>,
    page_size: usize,
    text_height: u16,
}

fn body_layout(area: Rect, app: &App) -> BodyLayout {
    let overlay = app
        .overlay_page()
        .filter(|page| page.form().is_none())
        .is_some();
    let summary_lines = app
        .primary_page()
        .map(|page| page.header.len() as u16)
        .unwrap_or(0);

    let (primary_area, overlay_area) = if overlay && app.full_screen() {
        (None, Some(area))
    } else if overlay {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        (Some(chunks[0]), Some(chunks[1]))
    } else {
        (Some(area), None)
    };

    let (summary, table) = match primary_area {
        Some(area) if summary_lines > 0 && area.height > summary_lines + 6 => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(summary_lines + 2), Constraint::Min(4)])
                .split(area);
            (Some(chunks[0]), Some(chunks[1]))
        }
        Some(area) => (None, Some(area)),
        None => (None, None),
    };

    let page_size = table.map(table_rows_visible).unwrap_or(1);
    let text_height = overlay
        .then_some(overlay_area)
        .flatten()
        .map(|area| area.height.saturating_sub(2).max(1))
        .unwrap_or(1);

    BodyLayout {
        summary,
        table,
        overlay: overlay_area,
        page_size,
        text_height,
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let left_line = build_left_header_line(app);
    let right_line = build_right_header_line(app);
    let right_width = spans_width(&right_line.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(left_line).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right_line).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn build_left_header_line(app: &App) -> Line<'static> {
    let config = app.config();
    let profile = config.profile.as_deref().unwrap_or("default");
    let region = config.region.as_deref().unwrap_or("env region");

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " ECSNAV ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(profile, 16)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(region, 16)),
        Color::White,
        PL_B,
        PL_C,
    );

    let mut location = app.breadcrumb();
    location.push(app.state().primary.title().to_ascii_lowercase());
    if let Some(page) = app.overlay_page() {
        location.push(page.secondary.title().to_string());
    }
    let location = location
        .iter()
        .map(|segment| compact_text(segment, 24))
        .collect::<Vec<_>>()
        .join(" › ");
    push_powerline_segment(
        &mut spans,
        format!(" {location} "),
        Color::White,
        PL_C,
        BG,
    );
    Line::from(spans)
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let mut segments: Vec<(String, Color, Color)> = Vec::new();
    if app.read_only() {
        segments.push((" RO ".to_string(), Color::Black, WARN));
    }
    let refresh = if app.config().refresh_enabled() {
        format!(" ⟳ {}s ", app.config().refresh_secs)
    } else {
        " ⟳ off ".to_string()
    };
    segments.push((refresh, Color::White, PL_B));
    let sessions = app.sessions();
    if !sessions.is_empty() {
        segments.push((format!(" pf {} ", sessions.len()), Color::White, PL_D));
    }

    let mut spans = Vec::new();
    let mut next_bg = BG;
    for (content, fg, bg) in segments {
        push_powerline_segment_rtl(&mut spans, content, fg, bg, next_bg);
        next_bg = bg;
    }
    spans.push(Span::styled(" ", Style::default().bg(next_bg)));
    Line::from(spans)
}

fn render_body(frame: &mut Frame, layout: &BodyLayout, app: &App) {
    if let (Some(area), Some(page)) = (layout.summary, app.primary_page()) {
        render_summary(frame, area, page);
    }
    if let Some(area) = layout.table {
        match app.primary_page() {
            Some(page) => render_table(frame, area, app, page, layout.overlay.is_none()),
            None => render_placeholder(frame, area, app),
        }
    }
    if let (Some(area), Some(page)) = (layout.overlay, app.overlay_page()) {
        render_overlay(frame, area, app, page);
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, app: &App) {
    let paragraph = Paragraph::new(Text::from(format!(
        "Loading {}…",
        app.state().primary.title().to_ascii_lowercase()
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(MUTED))
            .style(Style::default().bg(PANEL)),
    )
    .style(Style::default().fg(MUTED));
    frame.render_widget(paragraph, area);
}

fn render_summary(frame: &mut Frame, area: Rect, page: &Page) {
    let label_width = page
        .header
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let lines = page
        .header
        .iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(
                    format!("{label:<label_width$}  "),
                    Style::default().fg(MUTED),
                ),
                Span::styled(value.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect::<Vec<_>>();
    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(MUTED))
            .title_top(Line::from(page_age_label(page)).right_aligned())
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(paragraph, area);
}

fn page_age_label(page: &Page) -> String {
    format!(" loaded {} ago ", human_age(Some(page.built_at.with_timezone(&Utc))))
}

fn render_table(frame: &mut Frame, area: Rect, app: &App, page: &Page, focused: bool) {
    let Some(data) = page.table() else {
        return;
    };

    if let Some(error) = &data.error {
        let panel = Paragraph::new(Text::from(error.clone()))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(format!("{} error", page.title))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ERROR))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(ERROR));
        frame.render_widget(panel, area);
        return;
    }

    let include_pf_column =
        page.kind == PrimaryKind::Container && page.secondary == SecondaryKind::Empty;
    let mut headers = data.headers.clone();
    if include_pf_column {
        headers.push("PF".to_string());
    }
    let visible_rows = app.visible_rows(page);

    let header_row = Row::new(headers.iter().map(|header| {
        Cell::from(header.clone()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = visible_rows.iter().map(|row| {
        let mut columns = row.columns.clone();
        if include_pf_column {
            columns.push(app.session_cell(row));
        }
        Row::new(
            columns
                .into_iter()
                .map(|column| Cell::from(column).style(Style::default().fg(Color::White))),
        )
    });

    let mut title = format!("{} ({})", page.title, visible_rows.len());
    if page.secondary == SecondaryKind::Empty && !app.filter().is_empty() {
        title.push_str(&format!(" /{}", app.filter()));
    }
    if let Some(refreshed) = data.last_refreshed {
        title.push_str(&format!(" · {}", refreshed.format("%H:%M:%S")));
    }

    let table = Table::new(rows, column_constraints(headers.len()))
        .header(header_row)
        .block(panel_block(title, focused))
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");

    let mut state = TableState::default();
    state.select(app.selected_index(page));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_overlay(frame: &mut Frame, area: Rect, app: &App, page: &Page) {
    match &page.body {
        PageBody::Table(_) => render_table(frame, area, app, page, true),
        PageBody::Text(text) => {
            let text = if page.secondary == SecondaryKind::Revision && looks_like_diff(text) {
                highlight_diff_text(text)
            } else {
                highlight_structured_text(text)
            };
            let title = if app.full_screen() {
                format!("{} (full screen)", page.title)
            } else {
                page.title.clone()
            };
            let paragraph = Paragraph::new(text)
                .block(panel_block(title, true))
                .style(Style::default().fg(Color::White))
                .wrap(Wrap { trim: false })
                .scroll((app.overlay_scroll(), 0));
            frame.render_widget(paragraph, area);
        }
        PageBody::Form(_) => {}
    }
}

fn render_form(frame: &mut Frame, app: &App, form: &Form) {
    let area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, area);

    let label_width = form
        .fields
        .iter()
        .map(|field| field.label.chars().count())
        .max()
        .unwrap_or(0);
    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let focused = index == form.focus && app.mode() == InputMode::Form;
        let value_style = match field.value {
            FieldValue::Note(_) => Style::default().fg(MUTED),
            _ if focused => Style::default()
                .fg(Color::Black)
                .bg(Color::Rgb(94, 234, 212))
                .add_modifier(Modifier::BOLD),
            _ => Style::default().fg(Color::White),
        };
        let mut value = field.display_value();
        if focused && matches!(field.value, FieldValue::Text(_) | FieldValue::Number(_)) {
            value.push('▏');
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<label_width$}  ", field.label),
                Style::default().fg(if focused { ACCENT } else { MUTED }),
            ),
            Span::styled(value, value_style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "tab/↓ next  shift-tab/↑ prev  ←/→ choose  enter submit  esc cancel",
        Style::default().fg(MUTED),
    )));

    let title = app
        .overlay_page()
        .map(|page| page.title.clone())
        .unwrap_or_else(|| form.kind.title().to_string());
    let paragraph = Paragraph::new(Text::from(lines))
        .block(panel_block(title, true))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL))
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (label, prompt, label_bg) = match app.mode() {
        InputMode::Command => (" cmd ", Some(format!(":{}", app.input())), ACCENT),
        InputMode::Filter => (" flt ", Some(format!("/{}", app.input())), WARN),
        InputMode::Form => (" form ", None, PL_D),
        InputMode::Normal if app.read_only() => (" ro ", None, WARN),
        InputMode::Normal => (" nrm ", None, PL_A),
    };
    let label_fg = if label_bg == PL_A || label_bg == PL_D {
        Color::White
    } else {
        Color::Black
    };

    let mut spans = Vec::new();
    if let Some(prompt) = prompt {
        push_powerline_segment(&mut spans, label, label_fg, label_bg, PL_B);
        push_powerline_segment(&mut spans, format!(" {prompt} "), Color::White, PL_B, BG);
        push_completions(&mut spans, app, area.width as usize);
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let notice_bg = app
        .notice()
        .map(|notice| notice_color(notice.level))
        .unwrap_or(PL_B);
    push_powerline_segment(&mut spans, label, label_fg, label_bg, notice_bg);
    if let Some(notice) = app.notice() {
        let width = area.width.saturating_sub(24).min(120) as usize;
        push_powerline_segment(
            &mut spans,
            format!(
                " {} {} ",
                notice_icon(notice.level),
                compact_text(&notice.text, width.max(24))
            ),
            Color::Black,
            notice_bg,
            BG,
        );
    } else {
        spans.push(Span::styled("", Style::default().fg(notice_bg).bg(BG)));
    }

    let right_spans = hint_spans(app);
    let max_right = area.width.saturating_sub(28);
    let right_width = (spans_width(&right_spans) as u16).min(max_right);
    if right_width == 0 {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right_spans))
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn push_completions(spans: &mut Vec<Span<'static>>, app: &App, available_width: usize) {
    let completions = app.completion_candidates();
    if completions.is_empty() {
        return;
    }
    let selected = app
        .completion_index()
        .min(completions.len().saturating_sub(1));
    let start = selected.saturating_sub(2);
    let mut used_width = spans_width(spans);
    if used_width < available_width {
        spans.push(Span::raw(" "));
        used_width += 1;
    }
    if start > 0 {
        spans.push(Span::styled("… ", Style::default().fg(MUTED)));
        used_width += 2;
    }
    for (absolute_index, item) in completions.iter().enumerate().skip(start) {
        let chunk = format!("{item} ");
        let chunk_width = chunk.chars().count();
        if used_width + chunk_width + 1 > available_width {
            if absolute_index < completions.len() - 1 && used_width < available_width {
                spans.push(Span::styled("…", Style::default().fg(MUTED)));
            }
            break;
        }
        let style = if absolute_index == selected {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Rgb(94, 234, 212))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(chunk, style));
        used_width += chunk_width;
    }
}

fn hint_spans(app: &App) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let hints = if app.overlay_page().is_some() {
        &[][..]
    } else {
        app.hints()
    };
    let globals: &[(&str, &str)] = if app.overlay_page().is_some() {
        &[("f", "full screen"), ("esc", "close")]
    } else {
        &[("?", "help"), (":", "cmd"), ("q", "quit")]
    };
    let pairs = hints
        .iter()
        .map(|hint| (hint.key, hint.label))
        .chain(globals.iter().copied());
    for (key, label) in pairs {
        spans.push(Span::styled(
            format!("<{key}>"),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!(" {label} "), Style::default().fg(MUTED)));
    }
    spans
}

fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Rgb(125, 211, 252),
        NoticeLevel::Success => ACCENT,
        NoticeLevel::Warn => WARN,
        NoticeLevel::Error => ERROR,
    }
}

fn notice_icon(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "i",
        NoticeLevel::Success => "✓",
        NoticeLevel::Warn => "!",
        NoticeLevel::Error => "✗",
    }
}

fn highlight_structured_text(input: &str) -> Text<'static> {
    let trimmed = input.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
    {
        return highlight_json_text(trimmed);
    }
    Text::from(input.to_string())
}

fn looks_like_diff(input: &str) -> bool {
    input
        .lines()
        .any(|line| line.starts_with("+ ") || line.starts_with("- "))
}

fn highlight_diff_text(input: &str) -> Text<'static> {
    let lines = input
        .lines()
        .map(|line| {
            let color = if line.starts_with("+ ") {
                ACCENT
            } else if line.starts_with("- ") {
                ERROR
            } else {
                MUTED
            };
            Line::from(Span::styled(line.to_string(), Style::default().fg(color)))
        })
        .collect::<Vec<_>>();
    Text::from(lines)
}

fn highlight_json_text(input: &str) -> Text<'static> {
    let pretty = serde_json::from_str::<Value>(input)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| input.to_string());
    let lines = pretty
        .lines()
        .map(highlight_json_line)
        .collect::<Vec<Line<'static>>>();
    Text::from(lines)
}

fn highlight_json_line(line: &str) -> Line<'static> {
    let chars = line.chars().collect::<Vec<_>>();
    let mut index = 0usize;
    let mut spans = Vec::new();

    while index < chars.len() {
        let ch = chars[index];
        if ch.is_ascii_whitespace() {
            let start = index;
            while index < chars.len() && chars[index].is_ascii_whitespace() {
                index += 1;
            }
            spans.push(Span::raw(chars[start..index].iter().collect::<String>()));
            continue;
        }

        if matches!(ch, '{' | '}' | '[' | ']' | ':' | ',') {
            spans.push(Span::styled(ch.to_string(), Style::default().fg(MUTED)));
            index += 1;
            continue;
        }

        if ch == '"' {
            let (token, next_index) = read_json_string(&chars, index);
            let mut look_ahead = next_index;
            while look_ahead < chars.len() && chars[look_ahead].is_ascii_whitespace() {
                look_ahead += 1;
            }
            // keys and string values get different shades
            let color = if look_ahead < chars.len() && chars[look_ahead] == ':' {
                Color::Rgb(103, 232, 249)
            } else {
                Color::Rgb(125, 211, 252)
            };
            spans.push(Span::styled(token, Style::default().fg(color)));
            index = next_index;
            continue;
        }

        if ch.is_ascii_digit() || ch == '-' {
            let start = index;
            while index < chars.len()
                && (chars[index].is_ascii_digit()
                    || matches!(chars[index], '-' | '+' | '.' | 'e' | 'E'))
            {
                index += 1;
            }
            spans.push(Span::styled(
                chars[start..index].iter().collect::<String>(),
                Style::default().fg(Color::Rgb(251, 146, 60)),
            ));
            continue;
        }

        if ch.is_ascii_alphabetic() {
            let start = index;
            while index < chars.len() && chars[index].is_ascii_alphabetic() {
                index += 1;
            }
            spans.push(Span::styled(
                chars[start..index].iter().collect::<String>(),
                Style::default().fg(WARN),
            ));
            continue;
        }

        spans.push(Span::styled(
            ch.to_string(),
            Style::default().fg(Color::White),
        ));
        index += 1;
    }

    Line::from(spans)
}

fn read_json_string(chars: &[char], start: usize) -> (String, usize) {
    let mut index = start;
    let mut escaped = false;
    let mut token = String::new();
    while index < chars.len() {
        let ch = chars[index];
        token.push(ch);
        if index > start {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                return (token, index + 1);
            }
        }
        index += 1;
    }
    (token, chars.len())
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    if columns == 0 {
        return vec![Constraint::Percentage(100)];
    }

    let width = (100 / columns as u16).max(1);
    (0..columns)
        .map(|_| Constraint::Percentage(width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        build_left_header_line, build_right_header_line, column_constraints, compact_text, highlight_diff_text, highlight_json_line,
        looks_like_diff, page_age_label, render,
    };
    use crate::app::{App, EngineConfig};
    use crate::model::{Cluster, Entity, RowData, TableData};
    use chrono::Local;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Constraint;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        let mut text = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn clusters_app() -> App {
        let mut app = App::new(EngineConfig {
            refresh_secs: 0,
            profile: Some("prod".to_string()),
            ..EngineConfig::default()
        });
        app.start();
        let rows = ["alpha", "beta"]
            .into_iter()
            .map(|name| RowData {
                name: name.to_string(),
                columns: vec![name.to_string(), "ACTIVE".to_string()],
                entity: Some(Entity::Cluster(Cluster {
                    cluster_arn: format!("arn:cluster/{name}"),
                    cluster_name: name.to_string(),
                    ..Cluster::default()
                })),
            })
            .collect();
        let mut table = TableData::default();
        table.set_rows(
            vec!["Name".to_string(), "Status".to_string()],
            rows,
            Local::now(),
        );
        app.install_page(Ok(table));
        app
    }

    #[test]
    fn renders_cluster_table_and_header() {
        let mut app = clusters_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        terminal
            .draw(|frame| render(frame, &mut app))
            .expect("draw");

        let text = buffer_text(&terminal);
        assert!(text.contains("ECSNAV"));
        assert!(text.contains("prod"));
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(text.contains("Status"));
    }

    #[test]
    fn header_segments_end_in_powerline_arrows() {
        let app = clusters_app();
        let left: String = build_left_header_line(&app)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        let right: String = build_right_header_line(&app)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(left.starts_with(" ECSNAV \u{e0b0}"), "{left:?}");
        assert!(right.starts_with('\u{e0b2}'), "{right:?}");
    }

    #[test]
    fn summary_title_shows_page_age() {
        let app = clusters_app();
        let label = page_age_label(app.primary_page().expect("page"));
        assert!(label.starts_with(" loaded "), "{label:?}");
        assert!(label.ends_with("s ago "), "{label:?}");
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut app = clusters_app();
        let mut terminal = Terminal::new(TestBackend::new(20, 8)).expect("terminal");
        terminal
            .draw(|frame| render(frame, &mut app))
            .expect("draw");
    }

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("production", 20), "production");
        assert_eq!(compact_text("production", 5), "prod…");
        assert_eq!(compact_text("production", 1), "…");
    }

    #[test]
    fn column_constraints_split_evenly() {
        assert_eq!(column_constraints(0), vec![Constraint::Percentage(100)]);
        assert_eq!(
            column_constraints(4),
            vec![Constraint::Percentage(25); 4]
        );
    }

    #[test]
    fn json_keys_and_values_are_separate_spans() {
        let line = highlight_json_line(r#"  "family": "web","#);
        let contents = line
            .spans
            .iter()
            .map(|span| span.content.to_string())
            .collect::<Vec<_>>();
        assert!(contents.contains(&"\"family\"".to_string()));
        assert!(contents.contains(&"\"web\"".to_string()));
    }

    #[test]
    fn diff_lines_are_detected_and_colored() {
        let diff = "  {\n- \"cpu\": \"256\"\n+ \"cpu\": \"512\"\n  }";
        assert!(looks_like_diff(diff));
        assert!(!looks_like_diff("{\n  \"cpu\": \"256\"\n}"));
        assert_eq!(highlight_diff_text(diff).lines.len(), 4);
    }
}
