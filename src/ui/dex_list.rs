use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::text_input;
use crate::app::{App, AppMode, Pane};
use animaldex::dex::ReconciledEntry;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let searching = app.mode == AppMode::Searching;

    // Filter header (search input while typing, summary otherwise)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if searching { 3 } else { 1 }),
            Constraint::Min(0),
        ])
        .split(area);

    if searching {
        text_input::render(frame, &app.search_input, "Search name", true, chunks[0]);
    } else {
        render_filter_line(frame, app, chunks[0]);
    }

    let title = format!(" Dex {}/{} ", app.visible.len(), app.view.entries.len());

    let items: Vec<ListItem> = app
        .visible_entries()
        .map(entry_to_list_item)
        .collect();

    let border_color = if app.focus == Pane::List {
        Color::Blue
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if items.is_empty() {
        let message = if app.view.entries.is_empty() {
            if app.is_refreshing() {
                "Loading catalog..."
            } else {
                "The catalog is empty (r to refresh)"
            }
        } else {
            "Nothing matches (x clears filters)"
        };
        let paragraph = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, chunks[1]);
        return;
    }

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = ListState::default();
    state.select(Some(app.selected_index));

    frame.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_filter_line(frame: &mut Frame, app: &App, area: Rect) {
    let spans = vec![
        Span::styled(" /", Style::default().fg(Color::DarkGray)),
        Span::raw(if app.filter.text.trim().is_empty() {
            "*".to_string()
        } else {
            app.filter.text.trim().to_string()
        }),
        Span::styled("  c:", Style::default().fg(Color::DarkGray)),
        Span::styled(app.filter.category.label().to_string(), Style::default().fg(Color::Cyan)),
        Span::styled("  s:", Style::default().fg(Color::DarkGray)),
        Span::styled(app.filter.status.label(), Style::default().fg(Color::Magenta)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn entry_to_list_item(item: &ReconciledEntry) -> ListItem<'static> {
    let marker = if item.locked { "🔒" } else { "✔ " };
    let mut spans = vec![
        Span::raw(format!("{} ", marker)),
        Span::raw(item.entry.common_name.clone()),
    ];

    if !item.locked && item.photo_count > 0 {
        spans.push(Span::styled(
            format!(" [{}]", item.photo_count),
            Style::default().fg(Color::Yellow),
        ));
    }

    let style = if item.locked {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Green)
    };

    ListItem::new(Line::from(spans)).style(style)
}
