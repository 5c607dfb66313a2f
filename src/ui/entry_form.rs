//! Admin form for adding an animal to the catalog.

use std::path::PathBuf;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::text_input::TextInput;
use animaldex::admin::{parse_months, NewCatalogEntry, DEFAULT_VISIBILITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    CommonName,
    ScientificName,
    Category,
    ShortDescription,
    Location,
    Visibility,
    Months,
    MapUrl,
    LockFileName,
    LockedImage,
    UnlockedImage,
}

impl EntryField {
    pub const ALL: [EntryField; 11] = [
        EntryField::CommonName,
        EntryField::ScientificName,
        EntryField::Category,
        EntryField::ShortDescription,
        EntryField::Location,
        EntryField::Visibility,
        EntryField::Months,
        EntryField::MapUrl,
        EntryField::LockFileName,
        EntryField::LockedImage,
        EntryField::UnlockedImage,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EntryField::CommonName => "Common name*",
            EntryField::ScientificName => "Scientific name*",
            EntryField::Category => "Category*",
            EntryField::ShortDescription => "Description",
            EntryField::Location => "Where to find it",
            EntryField::Visibility => "Visibility",
            EntryField::Months => "Months (a, b, c)",
            EntryField::MapUrl => "Map URL",
            EntryField::LockFileName => "Lock file name",
            EntryField::LockedImage => "Locked image",
            EntryField::UnlockedImage => "Unlocked image",
        }
    }

    fn index(self) -> usize {
        EntryField::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

pub struct EntryForm {
    inputs: Vec<TextInput>,
    pub focus: EntryField,
    pub error: Option<String>,
    pub busy: bool,
}

impl EntryForm {
    pub fn new() -> Self {
        let mut inputs: Vec<TextInput> = EntryField::ALL.iter().map(|_| TextInput::default()).collect();
        inputs[EntryField::Visibility.index()].set(DEFAULT_VISIBILITY);
        Self {
            inputs,
            focus: EntryField::CommonName,
            error: None,
            busy: false,
        }
    }

    pub fn input(&self, field: EntryField) -> &TextInput {
        &self.inputs[field.index()]
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        &mut self.inputs[self.focus.index()]
    }

    pub fn next_field(&mut self) {
        let i = self.focus.index();
        self.focus = EntryField::ALL[(i + 1) % EntryField::ALL.len()];
    }

    pub fn prev_field(&mut self) {
        let i = self.focus.index();
        let len = EntryField::ALL.len();
        self.focus = EntryField::ALL[(i + len - 1) % len];
    }

    fn text(&self, field: EntryField) -> String {
        self.input(field).as_str().trim().to_string()
    }

    fn image(&self, field: EntryField) -> Result<Option<PathBuf>, String> {
        let raw = self.text(field);
        if raw.is_empty() {
            return Ok(None);
        }
        let path = match raw.strip_prefix("~/").zip(dirs::home_dir()) {
            Some((rest, home)) => home.join(rest),
            None => PathBuf::from(&raw),
        };
        if !path.is_file() {
            return Err(format!("No such file: {}", path.display()));
        }
        Ok(Some(path))
    }

    /// Build the entry, refusing it locally when mandatory fields are blank.
    pub fn to_entry(&self) -> Result<NewCatalogEntry, String> {
        let entry = NewCatalogEntry {
            common_name: self.text(EntryField::CommonName),
            scientific_name: self.text(EntryField::ScientificName),
            category: self.text(EntryField::Category),
            short_description: self.text(EntryField::ShortDescription),
            location_description: self.text(EntryField::Location),
            visibility_probability: self.text(EntryField::Visibility),
            sighting_months: parse_months(self.input(EntryField::Months).as_str()),
            map_url: self.text(EntryField::MapUrl),
            photo_lock_file_name: self.text(EntryField::LockFileName),
            locked_image: self.image(EntryField::LockedImage)?,
            unlocked_image: self.image(EntryField::UnlockedImage)?,
        };
        entry.validate().map_err(|e| e.to_string())?;
        Ok(entry)
    }
}

impl Default for EntryForm {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render(frame: &mut Frame, form: &EntryForm, area: Rect) {
    let fields = EntryField::ALL.len() as u16;
    let dialog_width = 72.min(area.width.saturating_sub(4));
    let dialog_height = (fields + 7).min(area.height.saturating_sub(2));

    let x = (area.width.saturating_sub(dialog_width)) / 2;
    let y = (area.height.saturating_sub(dialog_height)) / 2;
    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" New catalog entry ");
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(fields), // Fields
            Constraint::Length(1),
            Constraint::Length(2), // Error
            Constraint::Min(1),    // Help
        ])
        .margin(1)
        .split(dialog_area);

    // One row per field: label column then value
    let label_width: u16 = 18;
    let value_width = chunks[0].width.saturating_sub(label_width).max(1) as usize;

    for (row, field) in EntryField::ALL.iter().enumerate() {
        let row_area = Rect::new(chunks[0].x, chunks[0].y + row as u16, chunks[0].width, 1);
        if row_area.y >= chunks[0].y + chunks[0].height {
            break;
        }
        let input = form.input(*field);
        let focused = form.focus == *field;

        let scroll = if input.cursor >= value_width {
            input.cursor - value_width + 1
        } else {
            0
        };
        let visible: String = input.as_str().chars().skip(scroll).take(value_width).collect();

        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let value_style = if focused {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let line = Line::from(vec![
            Span::styled(format!("{:<width$}", field.label(), width = label_width as usize), label_style),
            Span::styled(visible, value_style),
        ]);
        frame.render_widget(Paragraph::new(line), row_area);

        if focused {
            let cursor_x = row_area.x + label_width + (input.cursor - scroll) as u16;
            frame.set_cursor_position(Position::new(cursor_x, row_area.y));
        }
    }

    if let Some(ref error) = form.error {
        let error = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });
        frame.render_widget(error, chunks[2]);
    } else if form.busy {
        let busy = Paragraph::new("Saving...").style(Style::default().fg(Color::Yellow));
        frame.render_widget(busy, chunks[2]);
    }

    let help = Paragraph::new("Tab/↓: next  Shift+Tab/↑: previous  Enter: save  Esc: cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}
