use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use super::photo_preview;
use crate::app::{App, Pane};
use animaldex::dex::ReconciledEntry;
use animaldex::models::Photo;

pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let show_preview = app.focus == Pane::Photos && app.preview.is_shown();
    if let Some(preview_area) = render_entry(frame, app, show_preview, area) {
        photo_preview::render(frame, &mut app.preview, preview_area);
    }
}

/// Draws everything but the preview; returns the area left for it.
fn render_entry(frame: &mut Frame, app: &App, show_preview: bool, area: Rect) -> Option<Rect> {
    let Some(item) = app.selected_item() else {
        let paragraph = Paragraph::new("Select an animal to see its details")
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(" Details "),
            )
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return None;
    };

    let photos = app.selected_photos();
    let photo_height = if item.locked {
        0
    } else {
        (photos.len() as u16 + 2).clamp(4, area.height / 2)
    };
    let preview_height = if show_preview && !item.locked {
        area.height.saturating_sub(photo_height) / 2
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(preview_height),
            Constraint::Length(photo_height),
        ])
        .split(area);

    render_info(frame, app, item, chunks[0]);
    if item.locked {
        return None;
    }
    render_photos(frame, app, photos, chunks[2]);
    (preview_height > 0).then_some(chunks[1])
}

fn field<'a>(label: &'a str, value: impl Into<String>) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::DarkGray)),
        Span::raw(value.into()),
    ])
}

fn render_info(frame: &mut Frame, app: &App, item: &ReconciledEntry, area: Rect) {
    let entry = &item.entry;
    let mut lines = vec![
        Line::from(Span::styled(
            entry.common_name.clone(),
            Style::default().add_modifier(Modifier::BOLD).fg(if item.locked {
                Color::Gray
            } else {
                Color::Green
            }),
        )),
        Line::from(Span::styled(
            entry.scientific_name.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
        field("Category", entry.category_label()),
    ];

    if let Some(ref visibility) = entry.visibility_probability {
        lines.push(field("Visibility", visibility.clone()));
    }
    if !entry.sighting_months.is_empty() {
        lines.push(field("Months", entry.sighting_months.join(", ")));
    }
    if let Some(ref location) = entry.location_description {
        lines.push(field("Where", location.clone()));
    }
    if let Some(ref map_url) = entry.map_url {
        lines.push(field("Map", map_url.clone()));
    }

    lines.push(Line::from(""));
    if item.locked {
        lines.push(Line::from(Span::styled(
            "Locked. Press u to unlock it with a photo.",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        if let Some(unlocked_at) = app
            .snapshot
            .unlock_for(entry.id)
            .and_then(|r| r.unlocked_at)
        {
            lines.push(field("Unlocked", unlocked_at.format("%Y-%m-%d %H:%M").to_string()));
        }
        if let Some(ref description) = entry.short_description {
            lines.push(Line::from(""));
            lines.push(Line::from(description.clone()));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Details ");
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_photos(frame: &mut Frame, app: &App, photos: &[Photo], area: Rect) {
    let focused = app.focus == Pane::Photos;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Blue } else { Color::DarkGray }))
        .title(format!(" Photos ({}) ", photos.len()));
    let block = match app.selected_photo() {
        Some(photo) if focused => block.title_bottom(Line::from(Span::styled(
            format!(" {} ", app.client.image_url(&photo.file_name)),
            Style::default().fg(Color::DarkGray),
        ))),
        _ => block,
    };

    if photos.is_empty() {
        let paragraph = Paragraph::new("No photos yet. Press a to add one.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = photos
        .iter()
        .map(|photo| {
            let mut spans = vec![Span::raw(photo.display_name().to_string())];
            if let Some(uploaded) = photo.uploaded_at {
                spans.push(Span::styled(
                    format!("  {}", uploaded.format("%Y-%m-%d")),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            if let Some(ref description) = photo.description {
                spans.push(Span::styled(
                    format!("  {}", description),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(if focused {
            Style::default().bg(Color::Blue).fg(Color::White)
        } else {
            Style::default().bg(Color::DarkGray)
        });

    let mut state = ListState::default();
    state.select(Some(app.photo_index.min(photos.len() - 1)));
    frame.render_stateful_widget(list, area, &mut state);
}
