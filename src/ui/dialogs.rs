use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

fn heading(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
    ))
}

pub fn render_help(frame: &mut Frame, is_admin: bool, area: Rect) {
    // Center the help dialog
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = 36.min(area.height.saturating_sub(4));

    let x = (area.width - dialog_width) / 2;
    let y = (area.height - dialog_height) / 2;

    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    // Clear the area behind the dialog
    frame.render_widget(Clear, dialog_area);

    let mut help_text = vec![
        heading("Navigation"),
        Line::from(""),
        Line::from("  j / ↓      Move down"),
        Line::from("  k / ↑      Move up"),
        Line::from("  gg         Go to top"),
        Line::from("  G          Go to bottom"),
        Line::from("  Tab        Switch between animals and photos"),
        Line::from(""),
        heading("Filters"),
        Line::from(""),
        Line::from("  /          Search by name"),
        Line::from("  c          Cycle category"),
        Line::from("  s          Cycle locked / unlocked"),
        Line::from("  x          Clear all filters"),
        Line::from(""),
        heading("Actions"),
        Line::from(""),
        Line::from("  u          Unlock the selected animal with a photo"),
        Line::from("  a          Add a photo to an unlocked animal"),
        Line::from("  e          Edit the selected photo"),
        Line::from("  d          Delete the selected photo"),
        Line::from("  D          Download the selected photo"),
        Line::from("  o          Open the sighting map"),
        Line::from("  E          Export the dex to CSV"),
        Line::from("  r          Refresh from the backend"),
        Line::from("  Esc        Cancel the most recent request"),
        Line::from("  L          Log out"),
        Line::from("  ?          Show this help"),
        Line::from("  q          Quit"),
    ];

    if is_admin {
        help_text.push(Line::from(""));
        help_text.push(heading("Admin"));
        help_text.push(Line::from(""));
        help_text.push(Line::from("  A          Open the admin panel"));
    }

    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help ")
                .title_style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, dialog_area);
}
