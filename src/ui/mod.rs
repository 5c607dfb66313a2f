pub mod admin_view;
pub mod confirm_dialog;
mod detail;
mod dex_list;
mod dialogs;
pub mod entry_form;
pub mod login_dialog;
pub mod photo_form;
pub mod photo_preview;
mod sidebar;
mod status_bar;
pub mod text_input;

use ratatui::prelude::*;

use crate::app::{App, AppMode};

/// Upper-case the first letter of an error message for display.
pub fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Nothing else is reachable until a session exists
    if app.mode == AppMode::Login {
        login_dialog::render(frame, &app.login_dialog, app.client.base_url(), area);
        return;
    }

    // Main layout: content area + status bar
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    if matches!(
        app.mode,
        AppMode::Admin | AppMode::AdminSearching | AppMode::CreatingEntry
    ) {
        if let Some(ref view) = app.admin_view {
            admin_view::render(frame, view, main_chunks[0]);
        }
        status_bar::render(frame, app, main_chunks[1]);
        if app.mode == AppMode::CreatingEntry {
            if let Some(ref form) = app.entry_form {
                entry_form::render(frame, form, area);
            }
        }
        return;
    }

    // Three-column layout for the dex
    let dex_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25), // Player and progress
            Constraint::Percentage(35), // Animals
            Constraint::Percentage(40), // Details
        ])
        .split(main_chunks[0]);

    sidebar::render(frame, app, dex_chunks[0]);
    dex_list::render(frame, app, dex_chunks[1]);
    detail::render(frame, app, dex_chunks[2]);

    status_bar::render(frame, app, main_chunks[1]);

    match app.mode {
        AppMode::Help => dialogs::render_help(frame, app.session.is_admin(), area),
        AppMode::Confirming => {
            if let Some(ref dialog) = app.confirm_dialog {
                confirm_dialog::render(frame, dialog, area);
            }
        }
        AppMode::Unlocking | AppMode::AddingPhoto | AppMode::EditingPhoto => {
            if let Some(ref form) = app.photo_form {
                photo_form::render(frame, form, area);
            }
        }
        _ => {}
    }
}
