use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use ratatui::Frame;

use super::app::{App, ExportFormat, RowState, View};
use crate::models::{TrackResult, TrackStatus};

const ACCENT: Color = Color::Cyan;
const DIM: Color = Color::DarkGray;
const COMPLETE_COLOR: Color = Color::Green;
const ERROR_COLOR: Color = Color::Red;
const PROGRESS_COLOR: Color = Color::Yellow;

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),   // Track table
            Constraint::Length(3), // Summary
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_track_table(frame, app, chunks[1]);
    render_summary(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);

    // Overlays
    match app.view {
        View::About => render_about_overlay(frame),
        View::Export => render_export_overlay(frame, app),
        View::Main => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = if app.is_running() {
        if app.abort_requested {
            Span::styled("aborting", Style::default().fg(ERROR_COLOR))
        } else {
            Span::styled("scanning", Style::default().fg(PROGRESS_COLOR))
        }
    } else {
        Span::styled("finished", Style::default().fg(COMPLETE_COLOR))
    };

    let text = vec![Line::from(vec![
        Span::styled("Path: ", Style::default().fg(DIM)),
        Span::styled(
            app.path.display().to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Jobs: ", Style::default().fg(DIM)),
        Span::raw(app.jobs.to_string()),
        Span::raw("  "),
        state,
    ])];

    let block = Block::default()
        .title(Span::styled(
            " ReplayGain Scanner ",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let paragraph = Paragraph::new(text).block(block);
    frame.render_widget(paragraph, area);
}

fn progress_bar(pct: f32) -> String {
    let bar_width = 12;
    let filled = ((pct * bar_width as f32) as usize).min(bar_width);
    let empty = bar_width - filled;
    format!(
        "{}{} {:>3}%",
        "\u{2588}".repeat(filled),
        "\u{2591}".repeat(empty),
        (pct * 100.0) as u32
    )
}

fn finished_row<'a>(num: String, name: &'a str, result: &'a TrackResult) -> Row<'a> {
    match &result.status {
        TrackStatus::Done | TrackStatus::Aborted => {
            let (mark, color) = if result.status.is_done() {
                ("\u{2713}", COMPLETE_COLOR)
            } else {
                ("\u{2205}", PROGRESS_COLOR)
            };
            Row::new(vec![
                Cell::from(num),
                Cell::from(name),
                Cell::from(result.gain_db.map(|g| format!("{:+.2} dB", g)).unwrap_or_default())
                    .style(Style::default().fg(color)),
                Cell::from(result.peak.map(|p| format!("{:.6}", p)).unwrap_or_default()),
                Cell::from(
                    result
                        .loudness_lufs
                        .map(|l| format!("{:.2} LUFS", l))
                        .unwrap_or_default(),
                ),
                Cell::from(mark).style(Style::default().fg(color)),
            ])
        }
        TrackStatus::NotStarted => Row::new(vec![
            Cell::from(num),
            Cell::from(name),
            Cell::from("skipped").style(Style::default().fg(DIM)),
            Cell::from(""),
            Cell::from(""),
            Cell::from("\u{00b7}").style(Style::default().fg(DIM)),
        ]),
        TrackStatus::Failed { message, .. } => Row::new(vec![
            Cell::from(num),
            Cell::from(name),
            Cell::from("ERR").style(Style::default().fg(ERROR_COLOR)),
            Cell::from(message.as_str()).style(Style::default().fg(ERROR_COLOR)),
            Cell::from(""),
            Cell::from("\u{2717}").style(Style::default().fg(ERROR_COLOR)),
        ]),
    }
}

fn render_track_table(frame: &mut Frame, app: &mut App, area: Rect) {
    // 2 for borders, 1 for header
    let inner_height = area.height.saturating_sub(3) as usize;
    app.visible_rows = inner_height;

    let total = app.tracks.len();
    let scroll_info = if total > inner_height {
        format!(
            " [{}-{}/{}] ",
            app.scroll_offset + 1,
            (app.scroll_offset + inner_height).min(total),
            total
        )
    } else {
        String::new()
    };

    let header = Row::new(vec![
        Cell::from("#").style(Style::default().fg(DIM)),
        Cell::from("Track").style(Style::default().fg(DIM)),
        Cell::from("Gain").style(Style::default().fg(DIM)),
        Cell::from("Peak").style(Style::default().fg(DIM)),
        Cell::from("Loudness").style(Style::default().fg(DIM)),
        Cell::from("").style(Style::default().fg(DIM)),
    ])
    .height(1);

    // Only render the visible slice of tracks
    let end = (app.scroll_offset + inner_height).min(app.tracks.len());
    let visible_slice = &app.tracks[app.scroll_offset.min(end)..end];

    let rows: Vec<Row> = visible_slice
        .iter()
        .enumerate()
        .map(|(vi, (name, state))| {
            let actual_index = app.scroll_offset + vi;
            let num = format!("{}", actual_index + 1);
            let style = if actual_index == app.selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            let row = match state {
                RowState::Pending => Row::new(vec![
                    Cell::from(num),
                    Cell::from(name.as_str()),
                    Cell::from("\u{00b7}").style(Style::default().fg(DIM)),
                    Cell::from(""),
                    Cell::from(""),
                    Cell::from("\u{00b7}").style(Style::default().fg(DIM)),
                ]),
                RowState::Scanning(pct) => Row::new(vec![
                    Cell::from(num),
                    Cell::from(name.as_str()),
                    Cell::from(progress_bar(*pct)).style(Style::default().fg(PROGRESS_COLOR)),
                    Cell::from(""),
                    Cell::from(""),
                    Cell::from("\u{27f3}").style(Style::default().fg(PROGRESS_COLOR)),
                ]),
                RowState::Finished(result) => finished_row(num, name.as_str(), result),
            };
            row.style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(20),
        Constraint::Length(18),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(2),
    ];

    let block = Block::default()
        .title(Span::styled(scroll_info, Style::default().fg(DIM)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray));

    frame.render_widget(table, area);
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let completed = app.completed_count();
    let total = app.tracks.len();

    let album_text = match app.report {
        Some(ref report) => match report.album {
            Some(ref album) => format!(
                "Album gain: {:+.2} dB  peak: {:.6}",
                album.gain_db, album.peak
            ),
            None if report.aborted => "Album gain: -- (aborted)".to_string(),
            None => "Album gain: --".to_string(),
        },
        None => format!("Scanning ({} in flight)", app.in_flight_count()),
    };

    let elapsed = app
        .scan_elapsed
        .unwrap_or_else(|| app.scan_start.elapsed())
        .as_secs_f64();
    let text = format!(
        "{} ({}/{} measured, {:.1}s)",
        album_text, completed, total, elapsed
    );
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        );
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let keys = match app.view {
        View::Main if app.is_running() => "[c]ancel scan  [a]bout  [q]uit",
        View::Main => "[e]xport  [a]bout  [q]uit",
        View::About | View::Export => "[Esc] close",
    };
    let footer = Paragraph::new(keys)
        .style(Style::default().fg(DIM))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

fn render_about_overlay(frame: &mut Frame) {
    let area = centered_rect(44, 10, frame.area());
    frame.render_widget(Clear, area);

    let text = vec![
        Line::from(Span::styled(
            "rgscan",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Version {}", env!("CARGO_PKG_VERSION"))),
        Line::from(""),
        Line::from("ReplayGain scanner for audio files."),
        Line::from("Loudness measured per EBU R128."),
        Line::from(""),
        Line::from(Span::styled("[Esc] close", Style::default().fg(DIM))),
    ];

    let block = Block::default()
        .title(" About ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, area);
}

fn render_export_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 12, frame.area());
    frame.render_widget(Clear, area);

    let format_name = match app.export_format {
        ExportFormat::Text => "Text table",
        ExportFormat::Json => "JSON",
        ExportFormat::Csv => "CSV",
    };
    let output_path = app
        .path
        .join(format!("rg_report.{}", app.export_format.extension()));

    let mut text = vec![
        Line::from(Span::styled(
            "Export Report",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Format: ", Style::default().fg(DIM)),
            Span::styled(format_name, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Output: ", Style::default().fg(DIM)),
            Span::styled(
                output_path.display().to_string(),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "[Tab] cycle format  [Enter] save  [Esc] cancel",
            Style::default().fg(DIM),
        )),
    ];

    if let Some(ref msg) = app.export_message {
        text.push(Line::from(""));
        text.push(Line::from(Span::styled(
            msg.as_str(),
            Style::default().fg(COMPLETE_COLOR),
        )));
    }

    let block = Block::default()
        .title(" Export ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
