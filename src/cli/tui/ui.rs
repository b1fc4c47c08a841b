//! UI rendering for the TUI.

use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::core::{DeviceType, Status, WorkflowState};

use super::app::TuiApp;

/// Main render function.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_content(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let mode = if app.simulation { " [SIM]" } else { "" };
    let title = format!(
        "DISKERASE  v{}  {}{}",
        env!("CARGO_PKG_VERSION"),
        app.snapshot.state.name(),
        mode
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(block, area);
}

fn render_content(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let panel_height = match &app.snapshot.state {
        WorkflowState::Browsing if app.snapshot.last_episode.is_none() => None,
        _ => Some(5),
    };

    match panel_height {
        Some(height) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(height)])
                .split(area);

            render_devices(frame, app, chunks[0]);
            match &app.snapshot.state {
                WorkflowState::Browsing => render_last_episode(frame, app, chunks[1]),
                WorkflowState::Confirming => render_confirm(frame, app, chunks[1]),
                WorkflowState::Erasing { .. } => render_erasing(frame, app, chunks[1]),
            }
        }
        None => render_devices(frame, app, area),
    }
}

fn render_devices(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Devices")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.snapshot.devices.is_empty() {
        let text = Paragraph::new("  No devices found  (press r to refresh)")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let selection = app.snapshot.selection.as_deref();

    let items: Vec<ListItem> = app
        .snapshot
        .devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let under_cursor = i == app.cursor;
            let style = if under_cursor {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let marker = if selection == Some(device.device_name.as_str()) {
                Span::styled("●", Style::default().fg(Color::Red))
            } else {
                Span::raw(" ")
            };

            let kind = match device.device_type {
                DeviceType::Hdd => Span::styled("HDD", Style::default().fg(Color::Yellow)),
                DeviceType::Ssd => Span::styled("SSD", Style::default().fg(Color::Green)),
                DeviceType::Unknown => Span::styled("???", Style::default().fg(Color::DarkGray)),
            };

            let line = Line::from(vec![
                Span::raw(if under_cursor { "> " } else { "  " }),
                marker,
                Span::raw(format!("  {:<14}  ", device.device_name)),
                kind,
                Span::raw(format!("  {:<8}  {}", device.transport, device.model)),
            ]);

            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

fn render_confirm(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let target = match app.snapshot.selected_device() {
        Some(device) => format!("{} ({})", device.device_name, device.model),
        None => "the selected device".to_string(),
    };

    let lines = vec![
        Line::from(Span::styled(
            format!("All data on {target} will be destroyed."),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from("This cannot be undone."),
        Line::from("[y] Erase   [n] Cancel"),
    ];

    let block = Block::default()
        .title("Confirm Erase")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_erasing(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let WorkflowState::Erasing {
        devices,
        started_at,
        ..
    } = &app.snapshot.state
    else {
        return;
    };

    let elapsed = (Utc::now() - *started_at).num_seconds().max(0) as u64;

    let lines = vec![
        Line::from(vec![
            Span::styled("▶ ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("Erasing {devices}")),
        ]),
        Line::from(format!("Elapsed: {}", format_duration(elapsed))),
        Line::from(Span::styled(
            "Do not disconnect the device.",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let block = Block::default()
        .title("Erase In Progress")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_last_episode(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let Some(report) = &app.snapshot.last_episode else {
        return;
    };

    let (icon, color) = if report.succeeded {
        ("✓", Color::Green)
    } else {
        ("✗", Color::Red)
    };
    let took = (report.finished_at - report.started_at).num_seconds().max(0) as u64;

    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{icon} "), Style::default().fg(color)),
            Span::raw(report.devices.to_string()),
        ]),
        Line::from(format!(
            "Finished {}  (took {})",
            report.finished_at.format("%Y-%m-%d %H:%M:%S"),
            format_duration(took)
        )),
        Line::from(report.message.clone()),
    ];

    let block = Block::default()
        .title("Last Erase")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text = match &app.snapshot.state {
        WorkflowState::Browsing => {
            "[↑↓] Navigate  [Enter] Select  [e] Erase  [r] Refresh  [q] Quit"
        }
        WorkflowState::Confirming => "[y] Confirm  [n/Esc] Cancel",
        WorkflowState::Erasing { .. } => "Erasing...",
    };

    let mut spans = vec![Span::raw(format!("  {}", help_text))];

    if let Some(status) = &app.snapshot.status {
        spans.push(Span::styled(
            format!("  {}", status.text()),
            Style::default().fg(status_color(status)),
        ));
    }

    if let Some(hint) = &app.hint {
        spans.push(Span::styled(
            format!("  {}", hint),
            Style::default().fg(Color::Yellow),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn status_color(status: &Status) -> Color {
    match status {
        Status::Info(_) => Color::Green,
        Status::Notice(_) => Color::Yellow,
        Status::Error(_) => Color::Red,
    }
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
