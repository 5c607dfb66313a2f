//! Form for unlocking an animal, adding a photo and editing a photo.

use std::path::PathBuf;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::text_input::{self, TextInput};
use animaldex::dex::{PhotoEdit, PhotoUpload, UnlockRequest};
use animaldex::models::Photo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoFormKind {
    Unlock,
    AddPhoto { entry_id: i64 },
    EditPhoto { photo_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoField {
    Name,
    Path,
    Description,
}

pub struct PhotoForm {
    pub kind: PhotoFormKind,
    pub name: TextInput,
    pub path: TextInput,
    pub description: TextInput,
    pub focus: PhotoField,
    pub error: Option<String>,
    /// Shown in the title (animal or photo name)
    pub subject: String,
}

impl PhotoForm {
    pub fn unlock(suggested_name: &str) -> Self {
        Self {
            kind: PhotoFormKind::Unlock,
            name: TextInput::new(suggested_name),
            path: TextInput::default(),
            description: TextInput::default(),
            focus: PhotoField::Name,
            error: None,
            subject: suggested_name.to_string(),
        }
    }

    pub fn add_photo(entry_id: i64, animal: &str) -> Self {
        Self {
            kind: PhotoFormKind::AddPhoto { entry_id },
            name: TextInput::default(),
            path: TextInput::default(),
            description: TextInput::default(),
            focus: PhotoField::Path,
            error: None,
            subject: animal.to_string(),
        }
    }

    pub fn edit_photo(photo: &Photo) -> Self {
        Self {
            kind: PhotoFormKind::EditPhoto { photo_id: photo.id },
            name: TextInput::default(),
            path: TextInput::default(),
            description: TextInput::new(photo.description.clone().unwrap_or_default()),
            focus: PhotoField::Description,
            error: None,
            subject: photo.display_name().to_string(),
        }
    }

    fn fields(&self) -> &'static [PhotoField] {
        match self.kind {
            PhotoFormKind::Unlock => &[PhotoField::Name, PhotoField::Path, PhotoField::Description],
            _ => &[PhotoField::Path, PhotoField::Description],
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

    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            PhotoField::Name => &mut self.name,
            PhotoField::Path => &mut self.path,
            PhotoField::Description => &mut self.description,
        }
    }

    /// The photo path with a leading `~` expanded. `None` when blank.
    pub fn photo_path(&self) -> Option<PathBuf> {
        let raw = self.path.as_str().trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return Some(home.join(rest));
            }
        }
        Some(PathBuf::from(raw))
    }

    fn checked_path(&self) -> Result<PathBuf, String> {
        let path = self.photo_path().ok_or_else(|| "Choose a photo file".to_string())?;
        if !path.is_file() {
            return Err(format!("No such file: {}", path.display()));
        }
        Ok(path)
    }

    pub fn unlock_request(&self) -> Result<UnlockRequest, String> {
        if self.name.as_str().trim().is_empty() {
            return Err("Enter the animal's common name".to_string());
        }
        let path = self.checked_path()?;
        Ok(UnlockRequest::new(self.name.as_str(), path, self.description.as_str()))
    }

    pub fn upload(&self) -> Result<PhotoUpload, String> {
        let path = self.checked_path()?;
        Ok(PhotoUpload::new(path, self.description.as_str()))
    }

    /// Only the fields that differ from `current`.
    pub fn edit(&self, current: &Photo) -> Result<PhotoEdit, String> {
        let replacement = match self.photo_path() {
            Some(_) => Some(self.checked_path()?),
            None => None,
        };
        let edit = PhotoEdit::diff(current, replacement, self.description.as_str());
        if edit.is_empty() {
            return Err("Nothing changed".to_string());
        }
        Ok(edit)
    }
}

pub fn render(frame: &mut Frame, form: &PhotoForm, area: Rect) {
    let with_name = form.kind == PhotoFormKind::Unlock;
    let dialog_width = 64.min(area.width.saturating_sub(4));
    let dialog_height: u16 = if with_name { 17 } else { 14 };
    let dialog_height = dialog_height.min(area.height.saturating_sub(2));

    let x = (area.width.saturating_sub(dialog_width)) / 2;
    let y = (area.height.saturating_sub(dialog_height)) / 2;
    let dialog_area = Rect::new(x, y, dialog_width, dialog_height);

    frame.render_widget(Clear, dialog_area);

    let title = match form.kind {
        PhotoFormKind::Unlock => format!(" Unlock {} ", form.subject),
        PhotoFormKind::AddPhoto { .. } => format!(" Add photo to {} ", form.subject),
        PhotoFormKind::EditPhoto { .. } => format!(" Edit {} ", form.subject),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(title);
    frame.render_widget(block, dialog_area);

    let mut constraints = Vec::new();
    if with_name {
        constraints.push(Constraint::Length(3));
    }
    constraints.extend([
        Constraint::Length(3), // Path
        Constraint::Length(3), // Description
        Constraint::Length(2), // Error
        Constraint::Min(1),    // Help
    ]);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .margin(1)
        .split(dialog_area);

    let mut i = 0;
    if with_name {
        text_input::render(frame, &form.name, "Common name", form.focus == PhotoField::Name, chunks[0]);
        i = 1;
    }

    let path_label = match form.kind {
        PhotoFormKind::EditPhoto { .. } => "Replacement photo (optional)",
        _ => "Photo file",
    };
    text_input::render(frame, &form.path, path_label, form.focus == PhotoField::Path, chunks[i]);
    text_input::render(
        frame,
        &form.description,
        "Description",
        form.focus == PhotoField::Description,
        chunks[i + 1],
    );

    if let Some(ref error) = form.error {
        let error = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });
        frame.render_widget(error, chunks[i + 2]);
    }

    let help = Paragraph::new("Tab: next field  Enter: submit  Esc: cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[i + 3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn photo(description: Option<&str>) -> Photo {
        Photo {
            id: 7,
            file_name: "7.jpg".into(),
            original_file_name: Some("fox.jpg".into()),
            content_type: None,
            description: description.map(String::from),
            uploaded_at: None,
            unlock_id: Some(1),
        }
    }

    #[test]
    fn test_unlock_requires_existing_file() {
        let mut form = PhotoForm::unlock("Guineu");
        assert_eq!(form.unlock_request().unwrap_err(), "Choose a photo file");

        form.path.set("/definitely/not/here.jpg");
        assert!(form.unlock_request().unwrap_err().starts_with("No such file"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"jpeg").unwrap();
        form.path.set(file.path().to_string_lossy().to_string());
        let request = form.unlock_request().unwrap();
        assert_eq!(request.common_name, "Guineu");
        assert_eq!(request.description, None);
    }

    #[test]
    fn test_field_cycle_skips_name_outside_unlock() {
        let mut form = PhotoForm::add_photo(3, "Guineu");
        assert_eq!(form.focus, PhotoField::Path);
        form.next_field();
        assert_eq!(form.focus, PhotoField::Description);
        form.next_field();
        assert_eq!(form.focus, PhotoField::Path);
    }

    #[test]
    fn test_edit_without_changes_is_refused() {
        let current = photo(Some("at dawn"));
        let form = PhotoForm::edit_photo(&current);
        assert_eq!(form.edit(&current).unwrap_err(), "Nothing changed");

        let mut form = PhotoForm::edit_photo(&current);
        form.description.set("at dusk");
        let edit = form.edit(&current).unwrap();
        assert_eq!(edit.description.as_deref(), Some("at dusk"));
        assert!(edit.replacement.is_none());
    }

    #[test]
    fn test_tilde_expansion() {
        let mut form = PhotoForm::add_photo(1, "x");
        form.path.set("~/pics/a.jpg");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(form.photo_path().unwrap(), home.join("pics/a.jpg"));
        }
    }
}
