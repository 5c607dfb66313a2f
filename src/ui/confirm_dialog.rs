//! Confirmation dialog for destructive actions.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

/// What runs when the user says yes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeletePhoto { photo_id: i64 },
    Logout,
}

pub struct ConfirmDialog {
    pub action: ConfirmAction,
    /// Description shown to user
    pub message: String,
}

impl ConfirmDialog {
    pub fn delete_photo(photo_id: i64, name: &str) -> Self {
        Self {
            action: ConfirmAction::DeletePhoto { photo_id },
            message: format!("Delete photo \"{}\"? This cannot be undone.", name),
        }
    }

    pub fn logout(name: &str, running: usize) -> Self {
        let message = if running > 0 {
            format!(
                "Log out {}? {} running request(s) will be cancelled.",
                name, running
            )
        } else {
            format!("Log out {}?", name)
        };
        Self {
            action: ConfirmAction::Logout,
            message,
        }
    }
}

pub fn render(frame: &mut Frame, dialog: &ConfirmDialog, area: Rect) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = 9.min(area.height);

    let x = (area.width - dialog_width) / 2;
    let y = (area.height - dialog_height) / 2;

    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    frame.render_widget(Clear, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Message
            Constraint::Length(3), // Buttons
        ])
        .margin(1)
        .split(dialog_area);

    let title = match dialog.action {
        ConfirmAction::DeletePhoto { .. } => " Delete Photo ",
        ConfirmAction::Logout => " Log Out ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    frame.render_widget(block, dialog_area);

    let message = Paragraph::new(dialog.message.as_str())
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    frame.render_widget(message, chunks[0]);

    let buttons = Line::from(vec![
        Span::styled("  [Enter/y] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("Yes"),
        Span::raw("    "),
        Span::styled("[Esc/n] ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw("No"),
    ]);
    let button_widget = Paragraph::new(buttons).alignment(Alignment::Center);
    frame.render_widget(button_widget, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_mentions_running_requests() {
        let dialog = ConfirmDialog::logout("anna", 2);
        assert_eq!(dialog.action, ConfirmAction::Logout);
        assert!(dialog.message.contains("2 running"));

        let idle = ConfirmDialog::logout("anna", 0);
        assert_eq!(idle.message, "Log out anna?");
    }

    #[test]
    fn test_delete_carries_photo_id() {
        let dialog = ConfirmDialog::delete_photo(42, "fox.jpg");
        assert_eq!(dialog.action, ConfirmAction::DeletePhoto { photo_id: 42 });
        assert!(dialog.message.contains("fox.jpg"));
    }
}
