use crate::app::record::{KeyRecord, ValueType};
use crate::app::value_format::{
    format_bytes_block, format_bytes_inline, format_json_pretty, format_number, format_ttl,
};
use crate::app::{App, Focus, Mode};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// helper function to create a centered rect using up certain percentage of the available rect `r`
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // key list and detail
            Constraint::Length(1), // prompt or key hints
            Constraint::Length(1), // status line
        ])
        .split(f.area());

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(main_layout[0]);

    draw_key_list(f, app, content[0]);
    draw_detail(f, app, content[1]);
    draw_footer(f, app, main_layout[1]);
    draw_status_line(f, app, main_layout[2]);

    match app.mode {
        Mode::Help => draw_help(f),
        Mode::Stats => draw_stats(f, app),
        Mode::ConfirmDelete => {
            let key = app.pending_delete.as_deref().unwrap_or("unknown");
            draw_confirm(
                f,
                "Confirm Deletion",
                format!("Delete key '{}'?", format_bytes_inline(key.as_bytes())),
            );
        }
        Mode::ConfirmPurge => draw_confirm(
            f,
            "Confirm Purge",
            format!("Delete ALL keys in database {}?", app.db()),
        ),
        _ => {}
    }
}

fn draw_key_list(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::List;
    let mut title = if app.records.len() < app.dispatcher.total() {
        format!("Keys ({}/{})", app.records.len(), app.dispatcher.total())
    } else {
        format!("Keys ({})", app.records.len())
    };
    if !app.search_pattern.is_empty() {
        title.push_str(&format!(" pattern: {}", app.search_pattern));
    }
    if !app.filter_query.is_empty() {
        let mode = if app.fuzzy { "fuzzy" } else { "strict" };
        title.push_str(&format!(" {}: {}", mode, app.filter_query));
    }
    if app.scan_in_progress {
        title.push_str(" [scanning]");
    }

    let items: Vec<ListItem> = app
        .records
        .iter()
        .map(|record| {
            let description_style = if record.fetch_error {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(vec![
                Line::from(format_bytes_inline(record.key.as_bytes())),
                Line::from(Span::styled(record.description(), description_style)),
            ])
        })
        .collect();

    let list_widget = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border_style(focused)),
        )
        .highlight_style(
            Style::default()
                .bg(if focused { Color::Yellow } else { Color::DarkGray })
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(if focused { ">> " } else { "   " });

    let mut list_state = ListState::default();
    if app.selected < app.records.len() {
        list_state.select(Some(app.selected));
    }
    f.render_stateful_widget(list_widget, area, &mut list_state);
}

fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Detail;
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Value")
        .border_style(border_style(focused));

    let text = match app.selected_record() {
        None if app.scan_in_progress => vec![Line::from("Scanning...")],
        None => vec![Line::from("No key selected")],
        Some(record) => detail_lines(record),
    };

    let mut paragraph = Paragraph::new(text)
        .block(block)
        .scroll((app.detail_scroll, 0));
    if app.wrap {
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    f.render_widget(paragraph, area);
}

fn detail_lines(record: &KeyRecord) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(vec![
        Span::styled("Key: ", label),
        Span::raw(format_bytes_inline(record.key.as_bytes())),
    ])];

    if !record.loaded {
        lines.push(Line::from(""));
        lines.push(Line::from("Loading value..."));
        return lines;
    }

    lines.push(Line::from(vec![
        Span::styled("Type: ", label),
        Span::raw(record.value_type.to_string()),
    ]));
    if record.ttl_seconds > 0 {
        lines.push(Line::from(vec![
            Span::styled("TTL: ", label),
            Span::raw(format!(
                "{} ({}s)",
                format_ttl(record.ttl_seconds),
                record.ttl_seconds
            )),
        ]));
    }
    lines.push(Line::from(""));

    if record.fetch_error {
        lines.push(Line::from(Span::styled(
            format!("Error: {}", record.value),
            Style::default().fg(Color::Red),
        )));
        return lines;
    }

    let body = if record.value_type == ValueType::String && !record.binary {
        // Control characters would reach the terminal; show those as hex.
        format_json_pretty(&format_bytes_block(record.value.as_bytes()))
    } else {
        format_json_pretty(&record.value)
    };
    lines.extend(body.lines().map(|line| Line::from(line.to_string())));
    lines
}

/// Column of the prompt cursor, kept inside `area` however long the input.
fn prompt_cursor_x(area: Rect, offset: usize) -> u16 {
    let offset = u16::try_from(offset)
        .unwrap_or(u16::MAX)
        .min(area.width.saturating_sub(1));
    area.x.saturating_add(offset)
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    if app.mode.is_prompt() {
        let label = match app.mode {
            Mode::Search => "Pattern: ",
            Mode::FuzzySearch if app.fuzzy => "Fuzzy filter: ",
            Mode::FuzzySearch => "Filter: ",
            Mode::SwitchDb => "Database: ",
            Mode::SetTtl => "TTL seconds (0 removes): ",
            _ => "New key: ",
        };
        let line = Line::from(vec![
            Span::styled(label, Style::default().fg(Color::Yellow)),
            Span::raw(app.input.value().to_string()),
        ]);
        f.render_widget(Paragraph::new(line), area);

        let offset = label.chars().count() + app.input.cursor();
        f.set_cursor_position((prompt_cursor_x(area, offset), area.y));
        return;
    }

    let hint = |text: &'static str| Span::styled(text, Style::default().fg(Color::Yellow));
    let help_spans = match app.mode {
        Mode::EditingKey => vec![hint("Waiting for editor to exit...")],
        Mode::ConfirmDelete | Mode::ConfirmPurge => vec![
            Span::styled("[Y]es", Style::default().fg(Color::Green)),
            Span::raw(" / "),
            Span::styled("[N]o (Esc)", Style::default().fg(Color::Red)),
        ],
        _ => vec![
            hint("q: quit"),
            Span::raw(" | "),
            hint("j/k: nav"),
            Span::raw(" | "),
            hint("←/→: focus"),
            Span::raw(" | "),
            hint("s: search"),
            Span::raw(" | "),
            hint("/: filter"),
            Span::raw(" | "),
            hint("x: del"),
            Span::raw(" | "),
            hint("e: edit"),
            Span::raw(" | "),
            hint("?: help"),
        ],
    };
    let footer = Paragraph::new(Line::from(help_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn draw_status_line(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.mode.label()),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(app.status.clone()),
        Span::raw(" | "),
        Span::raw(format!(
            "{} ({}) DB {}",
            app.settings.profile_name,
            app.topology(),
            app.db()
        )),
        Span::raw(" | "),
        Span::raw(if app.fuzzy { "FUZZY" } else { "STRICT" }),
    ];
    if app.wrap {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("WRAP", Style::default().fg(Color::Green)));
    }
    if !app.clock.is_empty() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            app.clock.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_confirm(f: &mut Frame, title: &str, question: String) {
    let area = centered_rect(60, 25, f.area());
    f.render_widget(Clear, area);

    let text = vec![
        Line::from(Span::styled(
            question,
            Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::from(""),
        Line::from("This action CANNOT be undone.").alignment(Alignment::Center),
        Line::from(""),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled(
                "[Y]es",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" or "),
            Span::styled(
                "[N]o (Esc)",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        ])
        .alignment(Alignment::Center),
    ];

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

const HELP_ENTRIES: &[(&str, &str)] = &[
    ("↑/k, ↓/j", "move selection (or scroll the value when focused)"),
    ("←/→", "focus key list / value pane"),
    ("PgUp/PgDn", "scroll the value pane"),
    ("r", "reload keys"),
    ("s", "search with a server-side pattern (glob)"),
    ("/", "filter the listed keys"),
    ("Ctrl+F", "toggle fuzzy / strict filtering"),
    ("e", "edit the selected string key in $EDITOR"),
    ("n", "create a new key in $EDITOR"),
    ("t", "set TTL of the selected key (0 removes it)"),
    ("x", "delete the selected key"),
    ("P", "purge the current database"),
    ("d", "switch database"),
    ("w", "toggle word wrap"),
    ("i", "server statistics"),
    ("?", "toggle this help"),
    ("q, Ctrl+C", "quit"),
];

fn draw_help(f: &mut Frame) {
    let area = centered_rect(70, 70, f.area());
    f.render_widget(Clear, area);

    let key_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = HELP_ENTRIES
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(format!("{:<12}", keys), key_style),
                Span::raw(*action),
            ])
        })
        .collect();

    let block = Block::default()
        .title("Help (? or Esc to close)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_stats(f: &mut Frame, app: &App) {
    let area = centered_rect(70, 80, f.area());
    f.render_widget(Clear, area);

    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();
    match (&app.stats, &app.stats_error) {
        (_, Some(error)) if !app.stats_loading => {
            lines.push(Line::from(Span::styled(
                format!("Failed to load statistics: {}", error),
                Style::default().fg(Color::Red),
            )));
        }
        (Some(report), _) => {
            let server = &report.server;
            lines.push(Line::from(Span::styled("Server", heading)));
            lines.push(Line::from(format!("  Version:          {}", server.version)));
            lines.push(Line::from(format!("  Uptime:           {}", server.uptime_human)));
            lines.push(Line::from(format!(
                "  Memory:           {} (peak {})",
                server.memory_used_human, server.memory_peak_human
            )));
            lines.push(Line::from(format!(
                "  Fragmentation:    {:.2}",
                server.fragmentation_ratio
            )));
            lines.push(Line::from(format!("  Clients:          {}", server.connected_clients)));
            lines.push(Line::from(format!(
                "  Ops/sec:          {}",
                format_number(server.instantaneous_ops_per_sec as u64)
            )));
            lines.push(Line::from(format!(
                "  Total commands:   {}",
                format_number(server.total_commands_processed)
            )));
            lines.push(Line::from(format!(
                "  Expired/evicted:  {} / {}",
                format_number(server.expired_keys),
                format_number(server.evicted_keys)
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Databases", heading)));
            if report.databases.is_empty() {
                lines.push(Line::from("  No keys in any database"));
            }
            for db in &report.databases {
                lines.push(Line::from(format!(
                    "  DB {:<3} {:>12} keys   avg TTL: {} (sample {})",
                    db.db,
                    format_number(db.keys),
                    db.avg_ttl,
                    db.sample_size
                )));
            }
        }
        _ => lines.push(Line::from("Loading statistics...")),
    }
    if app.stats_loading && app.stats.is_some() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Refreshing...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .title("Statistics (r refresh, i/q/Esc close)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::record::LoadedValue;

    fn text_of(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn unloaded_records_show_loading_placeholder() {
        let record = KeyRecord::unloaded("k");
        let text = text_of(&detail_lines(&record));
        assert_eq!(text, vec!["Key: k", "", "Loading value..."]);
    }

    #[test]
    fn loaded_string_with_ttl_shows_human_and_raw_seconds() {
        let mut record = KeyRecord::unloaded("session");
        record.apply(&LoadedValue {
            key: "session".to_string(),
            value_type: ValueType::String,
            ttl_seconds: 93_784,
            value: r#"{"user":1}"#.to_string(),
            fetch_error: false,
            binary: false,
        });
        let text = text_of(&detail_lines(&record));
        assert_eq!(
            text,
            vec![
                "Key: session",
                "Type: string",
                "TTL: 1d 02h 03m 04s (93784s)",
                "",
                "{",
                "  \"user\": 1",
                "}",
            ]
        );
    }

    #[test]
    fn fetch_errors_are_shown_in_place_of_the_value() {
        let mut record = KeyRecord::unloaded("odd");
        record.apply(&LoadedValue {
            key: "odd".to_string(),
            value_type: ValueType::Unknown,
            ttl_seconds: 0,
            value: "unsupported type: stream".to_string(),
            fetch_error: true,
            binary: false,
        });
        let text = text_of(&detail_lines(&record));
        assert_eq!(text.last().unwrap(), "Error: unsupported type: stream");
    }

    #[test]
    fn control_characters_render_as_hex_but_stay_raw() {
        let mut record = KeyRecord::unloaded("bell");
        record.apply(&LoadedValue {
            key: "bell".to_string(),
            value_type: ValueType::String,
            ttl_seconds: 0,
            value: "bell\x07ring".to_string(),
            fetch_error: false,
            binary: false,
        });
        let text = text_of(&detail_lines(&record));
        assert_eq!(text.last().unwrap(), "00000000: 62 65 6C 6C 07 72 69 6E 67");
        assert_eq!(record.value, "bell\u{7}ring");
    }

    #[test]
    fn prompt_cursor_stays_inside_the_line() {
        let area = Rect::new(2, 10, 20, 1);
        assert_eq!(prompt_cursor_x(area, 5), 7);
        assert_eq!(prompt_cursor_x(area, 19), 21);
        assert_eq!(prompt_cursor_x(area, 500), 21);
        assert_eq!(prompt_cursor_x(area, usize::MAX), 21);

        let far_right = Rect::new(u16::MAX - 3, 0, 3, 1);
        assert_eq!(prompt_cursor_x(far_right, 70_000), u16::MAX - 1);
    }
}
