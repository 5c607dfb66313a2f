//! Login and registration screen.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::capitalise;
use super::text_input::{self, TextInput};
use animaldex::models::Character;
use animaldex::session::{validate_registration, RegistrationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Name,
    Password,
    Confirm,
    Character,
}

pub struct LoginDialog {
    pub mode: LoginMode,
    pub name: TextInput,
    pub password: TextInput,
    pub confirm: TextInput,
    pub character: Character,
    pub focus: LoginField,
    pub error: Option<String>,
    /// A request is in flight
    pub busy: bool,
}

impl LoginDialog {
    pub fn new() -> Self {
        Self {
            mode: LoginMode::Login,
            name: TextInput::default(),
            password: TextInput::masked(),
            confirm: TextInput::masked(),
            character: Character::default(),
            focus: LoginField::Name,
            error: None,
            busy: false,
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LoginMode::Login => LoginMode::Register,
            LoginMode::Register => LoginMode::Login,
        };
        self.password.clear();
        self.confirm.clear();
        self.focus = LoginField::Name;
        self.error = None;
    }

    fn fields(&self) -> &'static [LoginField] {
        match self.mode {
            LoginMode::Login => &[LoginField::Name, LoginField::Password],
            LoginMode::Register => &[
                LoginField::Name,
                LoginField::Password,
                LoginField::Confirm,
                LoginField::Character,
            ],
        }
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        let i = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(i + 1) % fields.len()];
    }

    pub fn prev_field(&mut self) {
        let fields = self.fields();
        let i = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(i + fields.len() - 1) % fields.len()];
    }

    pub fn focused_input(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            LoginField::Name => Some(&mut self.name),
            LoginField::Password => Some(&mut self.password),
            LoginField::Confirm => Some(&mut self.confirm),
            LoginField::Character => None,
        }
    }

    /// Local checks before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        match self.mode {
            LoginMode::Login => {
                if self.name.as_str().trim().is_empty() || self.password.as_str().is_empty() {
                    return Err("Enter your name and password".to_string());
                }
                Ok(())
            }
            LoginMode::Register => validate_registration(
                self.name.as_str(),
                self.password.as_str(),
                self.confirm.as_str(),
            )
            .map_err(|e: RegistrationError| capitalise(&e.to_string())),
        }
    }
}

impl Default for LoginDialog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render(frame: &mut Frame, dialog: &LoginDialog, backend_url: &str, area: Rect) {
    let register = dialog.mode == LoginMode::Register;
    let dialog_width = 56.min(area.width.saturating_sub(4));
    let dialog_height: u16 = if register { 22 } else { 15 };
    let dialog_height = dialog_height.min(area.height.saturating_sub(2));

    let x = (area.width.saturating_sub(dialog_width)) / 2;
    let y = (area.height.saturating_sub(dialog_height)) / 2;
    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    frame.render_widget(Clear, dialog_area);

    let title = if register { " Join the Dex " } else { " Animal Dex " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(title)
        .title_style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(block, dialog_area);

    let mut constraints = vec![
        Constraint::Length(1), // Backend
        Constraint::Length(3), // Name
        Constraint::Length(3), // Password
    ];
    if register {
        constraints.push(Constraint::Length(3)); // Confirm
        constraints.push(Constraint::Length(4)); // Character
    }
    constraints.push(Constraint::Length(2)); // Error
    constraints.push(Constraint::Min(1)); // Help

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .margin(1)
        .split(dialog_area);

    let backend = Paragraph::new(format!("Backend: {}", backend_url))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(backend, chunks[0]);

    text_input::render(frame, &dialog.name, "Name", dialog.focus == LoginField::Name, chunks[1]);
    text_input::render(
        frame,
        &dialog.password,
        "Password",
        dialog.focus == LoginField::Password,
        chunks[2],
    );

    let mut next = 3;
    if register {
        text_input::render(
            frame,
            &dialog.confirm,
            "Confirm password",
            dialog.focus == LoginField::Confirm,
            chunks[3],
        );
        render_character_picker(frame, dialog, chunks[4]);
        next = 5;
    }

    if let Some(ref error) = dialog.error {
        let error = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });
        frame.render_widget(error, chunks[next]);
    } else if dialog.busy {
        let busy = Paragraph::new("Contacting backend...").style(Style::default().fg(Color::Yellow));
        frame.render_widget(busy, chunks[next]);
    }

    let switch = if register {
        "Ctrl+r: back to login"
    } else {
        "Ctrl+r: create an account"
    };
    let help = Paragraph::new(format!("Tab: next field  Enter: submit  {}  Esc: quit", switch))
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(help, chunks[next + 1]);
}

fn render_character_picker(frame: &mut Frame, dialog: &LoginDialog, area: Rect) {
    let focused = dialog.focus == LoginField::Character;
    let mut spans = Vec::new();
    for character in Character::ALL {
        let style = if character == dialog.character {
            Style::default()
                .fg(Color::Black)
                .bg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", character.display_name()), style));
        spans.push(Span::raw(" "));
    }

    let lines = vec![Line::from(spans), Line::from(Span::styled(
        dialog.character.tagline(),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        })
        .title(" Character (←/→) ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_into(input: &mut TextInput, s: &str) {
        for c in s.chars() {
            input.handle_char(c);
        }
    }

    #[test]
    fn test_field_cycle_depends_on_mode() {
        let mut dialog = LoginDialog::new();
        dialog.next_field();
        dialog.next_field();
        assert_eq!(dialog.focus, LoginField::Name);

        dialog.toggle_mode();
        dialog.prev_field();
        assert_eq!(dialog.focus, LoginField::Character);
        assert!(dialog.focused_input().is_none());
    }

    #[test]
    fn test_register_validation_message() {
        let mut dialog = LoginDialog::new();
        dialog.toggle_mode();
        type_into(&mut dialog.name, "anna");
        type_into(&mut dialog.password, "abc");
        type_into(&mut dialog.confirm, "abc");
        assert_eq!(
            dialog.validate().unwrap_err(),
            "Password must be at least 5 characters"
        );

        type_into(&mut dialog.password, "de");
        type_into(&mut dialog.confirm, "de");
        assert!(dialog.validate().is_ok());
    }

    #[test]
    fn test_login_requires_both_fields() {
        let mut dialog = LoginDialog::new();
        type_into(&mut dialog.name, "anna");
        assert!(dialog.validate().is_err());
        type_into(&mut dialog.password, "x");
        assert!(dialog.validate().is_ok());
    }
}
