use ratatui::{prelude::*, widgets::Paragraph};

use crate::app::{App, AppMode};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    // If there's a status message, show it prominently
    if let Some(ref message) = app.status_message {
        let line = Line::from(vec![Span::styled(
            format!(" {} ", message),
            Style::default().fg(Color::Yellow).bg(Color::DarkGray),
        )]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let who = match app.session.current() {
        Some(session) => format!(" {} ({}) ", session.name, session.role),
        None => " logged out ".to_string(),
    };

    let position = if app.visible.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", app.selected_index + 1, app.visible.len())
    };

    // Build running task indicators
    let running_tasks = app.task_manager.running_tasks();
    let task_indicators: String = running_tasks
        .iter()
        .map(|task| format!("[{}:{}s]", task.task_type.short_name(), task.elapsed().as_secs()))
        .collect::<Vec<_>>()
        .join(" ");

    let mut spans = vec![Span::styled(
        who,
        Style::default().fg(Color::White).bg(Color::DarkGray),
    )];

    let fetched = if app.loaded {
        format!(" synced {} ", app.snapshot.fetched_at().format("%H:%M:%S"))
    } else {
        " not synced ".to_string()
    };
    spans.push(Span::styled(fetched, Style::default().fg(Color::Gray)));

    if !task_indicators.is_empty() {
        spans.push(Span::styled(
            format!(" {} ", task_indicators),
            Style::default().fg(Color::Cyan),
        ));
    }

    let help_text = match app.mode {
        AppMode::Admin | AppMode::AdminSearching | AppMode::CreatingEntry => {
            " Enter:details /:search n:new entry E:export r:reload Esc:back ".to_string()
        }
        _ if app.session.is_admin() => format!(" {} | A:admin ?:help q:quit ", position),
        _ => format!(" {} | u:unlock ?:help q:quit ", position),
    };

    // Calculate remaining space and add spacing
    let content_len: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let help_len = help_text.chars().count();
    let available = area.width as usize;
    if available > content_len + help_len {
        spans.push(Span::raw(" ".repeat(available - content_len - help_len)));
    }

    spans.push(Span::styled(
        help_text,
        Style::default().fg(Color::White).bg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
