//! Admin panel: registered players and their progress.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use super::text_input::{self, TextInput};
use animaldex::admin::{search_users, totals, UserLevel};
use animaldex::models::UserSummary;

pub struct AdminView {
    pub users: Vec<UserSummary>,
    pub query: TextInput,
    pub searching: bool,
    pub selected: usize,
    pub loading: bool,
}

impl AdminView {
    pub fn new() -> Self {
        Self {
            users: Vec::new(),
            query: TextInput::default(),
            searching: false,
            selected: 0,
            loading: true,
        }
    }

    pub fn set_users(&mut self, users: Vec<UserSummary>) {
        self.users = users;
        self.loading = false;
        self.clamp_selection();
    }

    pub fn filtered(&self) -> Vec<&UserSummary> {
        search_users(&self.users, self.query.as_str())
    }

    pub fn selected_user(&self) -> Option<&UserSummary> {
        self.filtered().get(self.selected).copied()
    }

    pub fn move_down(&mut self) {
        let len = self.filtered().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        let len = self.filtered().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

impl Default for AdminView {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render(frame: &mut Frame, view: &AdminView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Totals
        ])
        .split(area);

    text_input::render(frame, &view.query, "Search players", view.searching, chunks[0]);

    let users = view.filtered();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(format!(" Players {}/{} ", users.len(), view.users.len()));

    if users.is_empty() {
        let message = if view.loading {
            "Loading players..."
        } else if view.users.is_empty() {
            "No players registered"
        } else {
            "No player matches the search"
        };
        let paragraph = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, chunks[1]);
    } else {
        let header = Row::new(["Name", "Email", "Unlocked", "Photos", "Level", "Last active"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = users
            .iter()
            .map(|user| {
                let level = UserLevel::of(user);
                let level_color = match level {
                    UserLevel::Beginner => Color::Gray,
                    UserLevel::Intermediate => Color::Yellow,
                    UserLevel::Expert => Color::Green,
                };
                Row::new(vec![
                    Cell::from(user.name.clone()),
                    Cell::from(user.email.clone().unwrap_or_default()),
                    Cell::from(user.unlocked_animals.to_string()),
                    Cell::from(user.uploaded_photos.to_string()),
                    Cell::from(level.to_string()).style(Style::default().fg(level_color)),
                    Cell::from(
                        user.last_activity
                            .map(|t| t.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(20),
                Constraint::Percentage(28),
                Constraint::Length(9),
                Constraint::Length(7),
                Constraint::Length(13),
                Constraint::Min(11),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White));

        let mut state = TableState::default();
        state.select(Some(view.selected));
        frame.render_stateful_widget(table, chunks[1], &mut state);
    }

    let sums = totals(&view.users);
    let line = Line::from(vec![
        Span::styled(" Players: ", Style::default().fg(Color::DarkGray)),
        Span::raw(sums.users.to_string()),
        Span::styled("   Unlocks: ", Style::default().fg(Color::DarkGray)),
        Span::raw(sums.unlocked_animals.to_string()),
        Span::styled("   Photos: ", Style::default().fg(Color::DarkGray)),
        Span::raw(sums.uploaded_photos.to_string()),
    ]);
    frame.render_widget(
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Totals "),
        ),
        chunks[2],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> UserSummary {
        UserSummary {
            id,
            name: name.to_string(),
            email: Some(format!("{}@example.org", name)),
            created_at: None,
            unlocked_animals: 0,
            uploaded_photos: 0,
            last_activity: None,
            role: None,
        }
    }

    #[test]
    fn test_selection_follows_search() {
        let mut view = AdminView::new();
        view.set_users(vec![user(1, "anna"), user(2, "bernat"), user(3, "carla")]);
        assert!(!view.loading);

        view.move_down();
        view.move_down();
        view.move_down();
        assert_eq!(view.selected, 2);

        view.query.set("bern");
        view.clamp_selection();
        assert_eq!(view.selected_user().map(|u| u.id), Some(2));
    }
}
