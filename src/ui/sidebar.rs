use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};

use crate::app::App;
use animaldex::dex::CategoryFilter;

/// Player card, completion gauge and per-category progress.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Explorer ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Player
            Constraint::Length(1), // Gauge
            Constraint::Length(3), // Counters
            Constraint::Min(0),    // Categories
        ])
        .split(inner);

    render_player(frame, app, chunks[0]);

    let stats = app.view.stats.scoped(&app.filter.category);
    let label = match app.filter.category {
        CategoryFilter::All => format!("{:.0}%", stats.completion_percent()),
        CategoryFilter::Only(ref name) => format!("{}: {:.0}%", name, stats.completion_percent()),
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(stats.completion_percent() / 100.0)
        .label(label);
    frame.render_widget(gauge, chunks[1]);

    let counters = vec![
        Line::from(vec![
            Span::styled("Unlocked: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{}/{}", stats.unlocked, stats.total_entries)),
        ]),
        Line::from(vec![
            Span::styled("Photos:   ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.total_photos.to_string()),
        ]),
    ];
    frame.render_widget(Paragraph::new(counters), chunks[2]);

    let items: Vec<ListItem> = app
        .view
        .stats
        .categories
        .iter()
        .map(|c| {
            let active = app.filter.category.matches(&c.category)
                && app.filter.category != CategoryFilter::All;
            let style = if active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{} {}/{}", c.category, c.unlocked, c.total)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Categories "),
    );
    frame.render_widget(list, chunks[3]);
}

fn render_player(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match app.session.current() {
        Some(session) => {
            let character = session.character_or_default();
            vec![
                Line::from(Span::styled(
                    session.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("{} · {}", character.display_name(), session.role),
                    Style::default().fg(Color::Cyan),
                )),
                Line::from(Span::styled(
                    character.tagline(),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )),
            ]
        }
        None => vec![Line::from("Not logged in")],
    };
    frame.render_widget(Paragraph::new(lines), area);
}
