use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::prelude::*;
use std::time::Duration;

use animaldex::api::{ApiClient, ApiError};
use animaldex::config::Config;
use animaldex::dex::{self, categories, CatalogSnapshot, DexFilter, DexView, ReconciledEntry};
use animaldex::export::{self, ExportFormat};
use animaldex::models::Photo;
use animaldex::session::{Session, SessionStore};
use animaldex::tasks::{BackgroundTaskManager, TaskCompletionInfo, TaskOutcome, TaskState, TaskType};

use crate::ui;
use crate::ui::capitalise;
use crate::ui::admin_view::AdminView;
use crate::ui::confirm_dialog::{ConfirmAction, ConfirmDialog};
use crate::ui::entry_form::EntryForm;
use crate::ui::login_dialog::{LoginDialog, LoginField, LoginMode};
use crate::ui::photo_form::{PhotoForm, PhotoFormKind};
use crate::ui::photo_preview::PhotoPreview;
use crate::ui::text_input::TextInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Login,
    Dex,
    Help,
    Searching,
    Unlocking,
    AddingPhoto,
    EditingPhoto,
    Confirming,
    Admin,
    AdminSearching,
    CreatingEntry,
}

/// Which dex pane j/k moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    List,
    Photos,
}

pub struct App {
    pub config: Config,
    pub session: SessionStore,
    pub client: ApiClient,
    pub mode: AppMode,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub g_pressed: bool,
    // Dex state
    pub snapshot: CatalogSnapshot,
    pub view: DexView,
    /// A snapshot has been received since login
    pub loaded: bool,
    pub filter: DexFilter,
    pub category_choices: Vec<String>,
    /// Indices into `view.entries` that pass the filter
    pub visible: Vec<usize>,
    pub selected_index: usize,
    pub focus: Pane,
    pub photo_index: usize,
    pub search_input: TextInput,
    // Dialogs
    pub login_dialog: LoginDialog,
    pub photo_form: Option<PhotoForm>,
    pub confirm_dialog: Option<ConfirmDialog>,
    pub admin_view: Option<AdminView>,
    pub entry_form: Option<EntryForm>,
    pub preview: PhotoPreview,
    pub task_manager: BackgroundTaskManager,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = SessionStore::open(&config.session.path);
        let client = ApiClient::new(&config.api)?.with_session(session.current());
        let logged_in = session.current().is_some();
        let snapshot = CatalogSnapshot::empty();

        let mut app = Self {
            config,
            session,
            client,
            mode: if logged_in { AppMode::Dex } else { AppMode::Login },
            should_quit: false,
            status_message: None,
            g_pressed: false,
            view: DexView::build(&snapshot),
            snapshot,
            loaded: false,
            filter: DexFilter::default(),
            category_choices: Vec::new(),
            visible: Vec::new(),
            selected_index: 0,
            focus: Pane::List,
            photo_index: 0,
            search_input: TextInput::default(),
            login_dialog: LoginDialog::new(),
            photo_form: None,
            confirm_dialog: None,
            admin_view: None,
            entry_form: None,
            preview: PhotoPreview::disabled(),
            task_manager: BackgroundTaskManager::new(),
        };

        if logged_in {
            app.start_refresh();
        }

        Ok(app)
    }

    pub async fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
        // The graphics query needs the terminal in raw mode
        if self.config.preview.image_preview {
            self.preview = PhotoPreview::detect();
        }

        while !self.should_quit {
            // Poll for task updates and handle completions
            for completion in self.task_manager.poll_updates() {
                self.handle_completion(completion);
            }
            self.sync_preview();

            terminal.draw(|frame| ui::render(frame, self))?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key)?,
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        self.task_manager.cancel_all();
        Ok(())
    }

    // --- Derived dex state ---

    pub fn visible_entries(&self) -> impl Iterator<Item = &ReconciledEntry> + '_ {
        self.visible.iter().filter_map(|&i| self.view.entries.get(i))
    }

    pub fn selected_item(&self) -> Option<&ReconciledEntry> {
        self.visible
            .get(self.selected_index)
            .and_then(|&i| self.view.entries.get(i))
    }

    pub fn selected_photos(&self) -> &[Photo] {
        match self.selected_item() {
            Some(item) if !item.locked => self.snapshot.photos_for(item.entry.id),
            _ => &[],
        }
    }

    pub fn selected_photo(&self) -> Option<&Photo> {
        self.selected_photos().get(self.photo_index)
    }

    pub fn is_refreshing(&self) -> bool {
        self.task_manager.is_running(TaskType::Refresh)
    }

    /// Re-run the filter over the current view, keeping the selection in
    /// range.
    pub fn recompute_visible(&mut self) {
        self.visible = self
            .view
            .entries
            .iter()
            .enumerate()
            .filter(|(_, item)| self.filter.matches(item))
            .map(|(i, _)| i)
            .collect();

        if self.visible.is_empty() {
            self.selected_index = 0;
        } else if self.selected_index >= self.visible.len() {
            self.selected_index = self.visible.len() - 1;
        }
        self.clamp_photo_index();
    }

    fn clamp_photo_index(&mut self) {
        let count = self.selected_photos().len();
        if count == 0 {
            self.photo_index = 0;
            self.focus = Pane::List;
        } else if self.photo_index >= count {
            self.photo_index = count - 1;
        }
    }

    /// Swap in a fresh snapshot, keeping the selected animal when it is
    /// still visible.
    pub fn apply_snapshot(&mut self, snapshot: CatalogSnapshot) {
        let selected_id = self.selected_item().map(|item| item.entry.id);

        self.view = DexView::build(&snapshot);
        self.category_choices = categories(snapshot.entries());
        self.snapshot = snapshot;
        self.loaded = true;
        self.recompute_visible();

        if let Some(id) = selected_id {
            if let Some(pos) = self
                .visible
                .iter()
                .position(|&i| self.view.entries[i].entry.id == id)
            {
                self.selected_index = pos;
                self.clamp_photo_index();
            }
        }
    }

    // --- Background tasks ---

    fn start_refresh(&mut self) {
        let client = self.client.clone();
        self.task_manager.supersede(TaskType::Refresh, async move {
            let snapshot = dex::refresh(&client).await?;
            let message = format!("{} animals loaded", snapshot.entries().len());
            Ok((message, TaskOutcome::Snapshot(snapshot)))
        });
    }

    /// Fetch the focused photo for the preview pane when it changed.
    fn sync_preview(&mut self) {
        if !self.preview.is_available() {
            return;
        }
        let target = match self.focus {
            Pane::Photos => self.selected_photo().cloned(),
            Pane::List => None,
        };

        match target {
            None => {
                if self.preview.is_shown() {
                    self.task_manager.cancel_type(TaskType::Preview);
                    self.preview.clear();
                }
            }
            Some(photo) if self.preview.photo_id() == Some(photo.id) => {}
            Some(photo) => {
                self.preview.start(photo.id);
                let client = self.client.clone();
                self.task_manager.supersede(TaskType::Preview, async move {
                    let image = dex::fetch_preview(&client, &photo).await?;
                    Ok((String::new(), TaskOutcome::Preview { photo_id: photo.id, image }))
                });
            }
        }
    }

    fn handle_completion(&mut self, completion: TaskCompletionInfo) {
        let prefix = completion.task_type.display_name();
        let quiet = matches!(completion.task_type, TaskType::Refresh | TaskType::Preview);

        match completion.state {
            TaskState::Cancelled => {
                tracing::debug!(task = prefix, "Dropped result of cancelled task");
                if !quiet {
                    self.status_message = Some(format!("{} cancelled", prefix));
                }
            }
            TaskState::Failed => {
                if let Some(error) = completion.error {
                    self.handle_failure(completion.task_type, error);
                }
            }
            TaskState::Completed | TaskState::Running => {
                // A fetch that started before the shown one may predate a
                // mutation the shown one already reflects
                if let TaskOutcome::Snapshot(ref snapshot) = completion.outcome {
                    if snapshot.is_older_than(&self.snapshot) {
                        tracing::debug!(
                            task = prefix,
                            generation = snapshot.generation(),
                            shown = self.snapshot.generation(),
                            "Dropped stale snapshot"
                        );
                        return;
                    }
                }
                if completion.task_type != TaskType::Preview {
                    self.status_message = Some(format!("{}: {}", prefix, completion.message));
                }
                self.handle_outcome(completion.task_type, completion.outcome);
            }
        }
    }

    fn handle_outcome(&mut self, task_type: TaskType, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            TaskOutcome::Authenticated { auth, character } => {
                let session = Session::from_auth(auth, character);
                self.status_message = Some(match self.session.establish(session) {
                    Ok(session) => format!("Welcome, {}", session.name),
                    Err(e) => {
                        // Still usable for this run, just not remembered
                        tracing::warn!(error = %e, "Could not persist session");
                        format!("Logged in, but {}", e)
                    }
                });
                self.client.set_session(self.session.current());
                self.login_dialog = LoginDialog::new();
                self.mode = AppMode::Dex;
                self.start_refresh();
            }
            TaskOutcome::Users(users) => {
                if let Some(ref mut view) = self.admin_view {
                    view.set_users(users);
                }
            }
            TaskOutcome::Preview { photo_id, image } => {
                self.preview.finish(photo_id, image);
            }
            TaskOutcome::Saved(path) => {
                tracing::info!(path = %path.display(), "Saved file");
            }
            TaskOutcome::Nothing => {}
        }

        if task_type == TaskType::CreateEntry {
            self.entry_form = None;
            if self.mode == AppMode::CreatingEntry {
                self.mode = AppMode::Admin;
            }
            self.start_refresh();
        }
    }

    fn handle_failure(&mut self, task_type: TaskType, error: ApiError) {
        tracing::warn!(task = task_type.display_name(), error = %error, "Task failed");
        let mut message = capitalise(&error.to_string());

        match task_type {
            TaskType::Preview => {
                self.preview.fail(message);
                return;
            }
            TaskType::Login | TaskType::Register => {
                self.login_dialog.busy = false;
                self.login_dialog.error = Some(message);
                return;
            }
            TaskType::CreateEntry => {
                if let Some(ref mut form) = self.entry_form {
                    form.busy = false;
                    form.error = Some(message);
                    return;
                }
            }
            TaskType::LoadUsers => {
                if let Some(ref mut view) = self.admin_view {
                    view.loading = false;
                }
            }
            _ => {}
        }

        if error.is_unauthorized() && self.session.current().is_some() {
            message.push_str(" (press L to log in again)");
        } else if error.is_transport() && self.config.is_local_backend() {
            message.push_str(" (is the backend running?)");
        }
        self.status_message = Some(format!("{} failed: {}", task_type.display_name(), message));
    }

    // --- Input ---

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Ctrl+C always quits
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }

        if self.mode == AppMode::Login {
            return self.handle_login_key(key);
        }

        if self.mode == AppMode::Help {
            self.mode = AppMode::Dex;
            return Ok(());
        }

        if self.mode == AppMode::Searching {
            return self.handle_search_key(key);
        }

        if matches!(
            self.mode,
            AppMode::Unlocking | AppMode::AddingPhoto | AppMode::EditingPhoto
        ) {
            return self.handle_photo_form_key(key);
        }

        if self.mode == AppMode::Confirming {
            return self.handle_confirm_dialog_key(key);
        }

        if self.mode == AppMode::Admin {
            return self.handle_admin_key(key);
        }

        if self.mode == AppMode::AdminSearching {
            return self.handle_admin_search_key(key);
        }

        if self.mode == AppMode::CreatingEntry {
            return self.handle_entry_form_key(key);
        }

        self.handle_dex_key(key)
    }

    fn handle_dex_key(&mut self, key: KeyEvent) -> Result<()> {
        // Handle g prefix for gg (go to top)
        if self.g_pressed {
            self.g_pressed = false;
            if key.code == KeyCode::Char('g') {
                self.go_to_top();
                return Ok(());
            }
        }

        self.status_message = None;

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.mode = AppMode::Help,
            KeyCode::Char('g') => self.g_pressed = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Char('G') => self.go_to_bottom(),
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Char('/') => {
                self.search_input.set(self.filter.text.clone());
                self.mode = AppMode::Searching;
            }
            KeyCode::Char('c') => {
                self.filter.category = self.filter.category.cycle(&self.category_choices);
                self.selected_index = 0;
                self.recompute_visible();
            }
            KeyCode::Char('s') => {
                self.filter.status = self.filter.status.next();
                self.selected_index = 0;
                self.recompute_visible();
            }
            KeyCode::Char('x') => {
                self.filter.clear();
                self.search_input.clear();
                self.recompute_visible();
            }
            KeyCode::Char('r') => {
                self.start_refresh();
                self.status_message = Some("Refreshing...".to_string());
            }
            KeyCode::Char('u') => self.open_unlock_form(),
            KeyCode::Char('a') => self.open_add_photo_form(),
            KeyCode::Char('e') => self.open_edit_photo_form(),
            KeyCode::Char('d') => self.confirm_delete_photo(),
            KeyCode::Char('D') => self.download_selected_photo(),
            KeyCode::Char('o') => self.open_map()?,
            KeyCode::Char('E') => self.export_dex(),
            KeyCode::Char('A') => self.open_admin(),
            KeyCode::Char('L') => {
                let name = self
                    .session
                    .current()
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                let running = self.task_manager.running_tasks().len();
                self.confirm_dialog = Some(ConfirmDialog::logout(&name, running));
                self.mode = AppMode::Confirming;
            }
            KeyCode::Esc => {
                if self.task_manager.cancel_most_recent() {
                    self.status_message = Some("Request cancelled".to_string());
                } else if self.task_manager.has_running_tasks() {
                    self.status_message = Some("Changes already sent cannot be cancelled".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.mode != AppMode::Dex {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => self.move_down(),
            MouseEventKind::ScrollUp => self.move_up(),
            _ => {}
        }
    }

    fn move_down(&mut self) {
        match self.focus {
            Pane::List => {
                if !self.visible.is_empty() && self.selected_index < self.visible.len() - 1 {
                    self.selected_index += 1;
                    self.photo_index = 0;
                }
            }
            Pane::Photos => {
                let count = self.selected_photos().len();
                if count > 0 && self.photo_index < count - 1 {
                    self.photo_index += 1;
                }
            }
        }
    }

    fn move_up(&mut self) {
        match self.focus {
            Pane::List => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                    self.photo_index = 0;
                }
            }
            Pane::Photos => self.photo_index = self.photo_index.saturating_sub(1),
        }
    }

    fn go_to_top(&mut self) {
        match self.focus {
            Pane::List => {
                self.selected_index = 0;
                self.photo_index = 0;
            }
            Pane::Photos => self.photo_index = 0,
        }
    }

    fn go_to_bottom(&mut self) {
        match self.focus {
            Pane::List => {
                if !self.visible.is_empty() {
                    self.selected_index = self.visible.len() - 1;
                    self.photo_index = 0;
                }
            }
            Pane::Photos => self.photo_index = self.selected_photos().len().saturating_sub(1),
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::List if !self.selected_photos().is_empty() => Pane::Photos,
            _ => Pane::List,
        };
    }

    // --- Login ---

    fn handle_login_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                return Ok(());
            }
            KeyCode::Enter => {
                self.submit_login();
                return Ok(());
            }
            _ => {}
        }

        let dialog = &mut self.login_dialog;
        match key.code {
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if !dialog.busy {
                    dialog.toggle_mode();
                }
            }
            KeyCode::Tab | KeyCode::Down => dialog.next_field(),
            KeyCode::BackTab | KeyCode::Up => dialog.prev_field(),
            KeyCode::Left if dialog.focus == LoginField::Character => {
                dialog.character = dialog.character.prev();
            }
            KeyCode::Right if dialog.focus == LoginField::Character => {
                dialog.character = dialog.character.next();
            }
            _ => {
                if let Some(input) = dialog.focused_input() {
                    if input.handle_key(key) {
                        dialog.error = None;
                    }
                }
            }
        }
        Ok(())
    }

    fn submit_login(&mut self) {
        if self.login_dialog.busy {
            return;
        }
        if let Err(message) = self.login_dialog.validate() {
            self.login_dialog.error = Some(message);
            return;
        }

        let dialog = &self.login_dialog;
        let client = self.client.clone();
        let name = dialog.name.as_str().trim().to_string();
        let password = dialog.password.as_str().to_string();

        let started = match dialog.mode {
            LoginMode::Login => self.task_manager.spawn(TaskType::Login, async move {
                let auth = client.login(&name, &password).await?;
                let message = format!("logged in as {}", auth.name);
                Ok((message, TaskOutcome::Authenticated { auth, character: None }))
            }),
            LoginMode::Register => {
                let character = Some(dialog.character);
                self.task_manager.spawn(TaskType::Register, async move {
                    let auth = client.register(&name, &password).await?;
                    let message = format!("welcome to the dex, {}", auth.name);
                    Ok((message, TaskOutcome::Authenticated { auth, character }))
                })
            }
        };

        if started.is_some() {
            self.login_dialog.busy = true;
            self.login_dialog.error = None;
        }
    }

    // --- Search ---

    fn handle_search_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Enter => self.mode = AppMode::Dex,
            KeyCode::Esc => {
                self.search_input.clear();
                self.filter.text.clear();
                self.recompute_visible();
                self.mode = AppMode::Dex;
            }
            _ => {
                if self.search_input.handle_key(key) {
                    self.filter.text = self.search_input.as_str().to_string();
                    self.selected_index = 0;
                    self.recompute_visible();
                }
            }
        }
        Ok(())
    }

    // --- Unlock and photos ---

    fn open_unlock_form(&mut self) {
        let Some(item) = self.selected_item() else {
            self.photo_form = Some(PhotoForm::unlock(""));
            self.mode = AppMode::Unlocking;
            return;
        };
        if !item.locked {
            self.status_message = Some(format!("{} is already unlocked", item.entry.common_name));
            return;
        }
        self.photo_form = Some(PhotoForm::unlock(&item.entry.common_name));
        self.mode = AppMode::Unlocking;
    }

    fn open_add_photo_form(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let entry_id = item.entry.id;
        let name = item.entry.common_name.clone();
        // Refused locally, nothing is sent for a locked animal
        if let Err(e) = dex::require_unlocked(&self.snapshot, entry_id) {
            self.status_message = Some(format!("{} ({})", capitalise(&e.to_string()), name));
            return;
        }
        self.photo_form = Some(PhotoForm::add_photo(entry_id, &name));
        self.mode = AppMode::AddingPhoto;
    }

    fn open_edit_photo_form(&mut self) {
        match self.selected_photo() {
            Some(photo) => {
                self.photo_form = Some(PhotoForm::edit_photo(photo));
                self.mode = AppMode::EditingPhoto;
            }
            None => self.status_message = Some("No photo selected (Tab to the photo list)".to_string()),
        }
    }

    fn handle_photo_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(ref mut form) = self.photo_form else {
            self.mode = AppMode::Dex;
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => {
                self.photo_form = None;
                self.mode = AppMode::Dex;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Enter => self.submit_photo_form(),
            _ => {
                if form.focused_input().handle_key(key) {
                    form.error = None;
                }
            }
        }
        Ok(())
    }

    fn submit_photo_form(&mut self) {
        let Some(form) = self.photo_form.as_ref() else {
            return;
        };
        let client = self.client.clone();

        let started = match form.kind.clone() {
            PhotoFormKind::Unlock => match form.unlock_request() {
                Ok(request) => self.task_manager.spawn(TaskType::Unlock, async move {
                    let snapshot = dex::unlock(&client, &request).await?;
                    let message = format!("{} submitted", request.common_name);
                    Ok((message, TaskOutcome::Snapshot(snapshot)))
                }),
                Err(message) => return self.set_form_error(message),
            },
            PhotoFormKind::AddPhoto { entry_id } => match form.upload() {
                Ok(upload) => {
                    let snapshot = self.snapshot.clone();
                    self.task_manager.spawn(TaskType::AddPhoto, async move {
                        let snapshot = dex::add_photo(&client, &snapshot, entry_id, &upload).await?;
                        Ok(("photo added".to_string(), TaskOutcome::Snapshot(snapshot)))
                    })
                }
                Err(message) => return self.set_form_error(message),
            },
            PhotoFormKind::EditPhoto { photo_id } => {
                let Some(current) = self.snapshot.photo(photo_id) else {
                    return self.set_form_error("This photo no longer exists".to_string());
                };
                match form.edit(current) {
                    Ok(edit) => self.task_manager.spawn(TaskType::EditPhoto, async move {
                        let snapshot = dex::edit_photo(&client, photo_id, &edit).await?;
                        Ok(("photo updated".to_string(), TaskOutcome::Snapshot(snapshot)))
                    }),
                    Err(message) => return self.set_form_error(message),
                }
            }
        };

        match started {
            Some(_) => {
                self.photo_form = None;
                self.mode = AppMode::Dex;
                self.status_message = Some("Uploading...".to_string());
            }
            None => self.set_form_error("Another upload of this kind is still running".to_string()),
        }
    }

    fn set_form_error(&mut self, message: String) {
        if let Some(ref mut form) = self.photo_form {
            form.error = Some(message);
        }
    }

    fn confirm_delete_photo(&mut self) {
        match self.selected_photo() {
            Some(photo) => {
                self.confirm_dialog = Some(ConfirmDialog::delete_photo(photo.id, photo.display_name()));
                self.mode = AppMode::Confirming;
            }
            None => self.status_message = Some("No photo selected (Tab to the photo list)".to_string()),
        }
    }

    fn download_selected_photo(&mut self) {
        let Some(photo) = self.selected_photo().cloned() else {
            self.status_message = Some("No photo selected (Tab to the photo list)".to_string());
            return;
        };
        let client = self.client.clone();
        let dir = self.config.download.dir.clone();
        let started = self.task_manager.spawn(TaskType::Download, async move {
            let path = dex::download_photo(&client, &photo, &dir).await?;
            Ok((format!("saved {}", path.display()), TaskOutcome::Saved(path)))
        });
        if started.is_none() {
            self.status_message = Some("A download is already running".to_string());
        }
    }

    fn handle_confirm_dialog_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(dialog) = self.confirm_dialog.take() {
                    self.mode = AppMode::Dex;
                    self.execute_confirmed_action(dialog.action);
                }
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.confirm_dialog = None;
                self.mode = AppMode::Dex;
            }
            _ => {}
        }
        Ok(())
    }

    fn execute_confirmed_action(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeletePhoto { photo_id } => {
                let client = self.client.clone();
                let started = self.task_manager.spawn(TaskType::DeletePhoto, async move {
                    let snapshot = dex::delete_photo(&client, photo_id).await?;
                    Ok(("photo deleted".to_string(), TaskOutcome::Snapshot(snapshot)))
                });
                if started.is_none() {
                    self.status_message = Some("A delete is already running".to_string());
                }
            }
            ConfirmAction::Logout => self.logout(),
        }
    }

    fn logout(&mut self) {
        self.task_manager.cancel_all();
        if let Err(e) = self.session.clear() {
            tracing::warn!(error = %e, "Could not remove saved session");
        }
        self.client.set_session(None);

        self.snapshot = CatalogSnapshot::empty();
        self.view = DexView::build(&self.snapshot);
        self.loaded = false;
        self.filter.clear();
        self.search_input.clear();
        self.category_choices.clear();
        self.recompute_visible();
        self.admin_view = None;
        self.entry_form = None;
        self.photo_form = None;
        self.preview.clear();
        self.focus = Pane::List;
        self.photo_index = 0;
        self.login_dialog = LoginDialog::new();
        self.mode = AppMode::Login;
        self.status_message = None;
    }

    // --- Map and export ---

    fn open_map(&mut self) -> Result<()> {
        let Some(item) = self.selected_item() else {
            return Ok(());
        };
        let Some(url) = item.entry.map_url.clone().filter(|u| !u.trim().is_empty()) else {
            self.status_message = Some(format!("No map for {}", item.entry.common_name));
            return Ok(());
        };
        match self.open_with_system(&url) {
            Ok(()) => self.status_message = Some(format!("Opened map: {}", url)),
            Err(e) => self.status_message = Some(e.to_string()),
        }
        Ok(())
    }

    fn open_with_system(&self, target: &str) -> Result<()> {
        let opener = if let Some(ref command) = self.config.map.external_opener {
            command.as_str()
        } else {
            // Use system default
            #[cfg(target_os = "macos")]
            { "open" }
            #[cfg(target_os = "windows")]
            { "explorer" }
            #[cfg(not(any(target_os = "macos", target_os = "windows")))]
            { "xdg-open" }
        };

        std::process::Command::new(opener)
            .arg(target)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to run {}: {}", opener, e))?;

        Ok(())
    }

    fn export_dex(&mut self) {
        let format = ExportFormat::Csv;
        let path = export::default_path(&self.config.download.dir, "dex", format);
        self.status_message = Some(match export::export_dex(&self.view, &path, format) {
            Ok(count) => format!("Exported {} animals to {}", count, path.display()),
            Err(e) => {
                tracing::error!(error = %e, "Dex export failed");
                format!("Export failed: {:#}", e)
            }
        });
    }

    // --- Admin ---

    fn open_admin(&mut self) {
        if !self.session.is_admin() {
            self.status_message = Some("The admin panel is for admins only".to_string());
            return;
        }
        self.admin_view = Some(AdminView::new());
        self.mode = AppMode::Admin;
        self.load_users();
    }

    fn load_users(&mut self) {
        if let Some(ref mut view) = self.admin_view {
            view.loading = true;
        }
        let client = self.client.clone();
        self.task_manager.supersede(TaskType::LoadUsers, async move {
            let users = client.list_users().await?;
            Ok((format!("{} players", users.len()), TaskOutcome::Users(users)))
        });
    }

    fn leave_admin(&mut self) {
        // Late admin results have nowhere to go. A created entry still
        // lands in the dex.
        self.task_manager
            .cancel_where(|t| t.is_admin_task() && !t.is_mutation());
        self.admin_view = None;
        self.entry_form = None;
        self.mode = AppMode::Dex;
    }

    fn handle_admin_key(&mut self, key: KeyEvent) -> Result<()> {
        self.status_message = None;
        let Some(ref mut view) = self.admin_view else {
            self.mode = AppMode::Dex;
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => self.leave_admin(),
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => view.move_down(),
            KeyCode::Char('k') | KeyCode::Up => view.move_up(),
            KeyCode::Enter => {
                if let Some(user) = view.selected_user() {
                    let date = |t: Option<chrono::NaiveDateTime>| {
                        t.map(|t| t.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "unknown".to_string())
                    };
                    self.status_message = Some(format!(
                        "{} (#{}): joined {}, last active {}, role {}",
                        user.name,
                        user.id,
                        date(user.created_at),
                        date(user.last_activity),
                        user.role.as_deref().unwrap_or("user")
                    ));
                }
            }
            KeyCode::Char('/') => {
                view.searching = true;
                self.mode = AppMode::AdminSearching;
            }
            KeyCode::Char('r') => self.load_users(),
            KeyCode::Char('n') => {
                self.entry_form = Some(EntryForm::new());
                self.mode = AppMode::CreatingEntry;
            }
            KeyCode::Char('E') => self.export_users(),
            _ => {}
        }
        Ok(())
    }

    fn handle_admin_search_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(ref mut view) = self.admin_view else {
            self.mode = AppMode::Dex;
            return Ok(());
        };

        match key.code {
            KeyCode::Enter => {
                view.searching = false;
                self.mode = AppMode::Admin;
            }
            KeyCode::Esc => {
                view.query.clear();
                view.searching = false;
                view.clamp_selection();
                self.mode = AppMode::Admin;
            }
            _ => {
                if view.query.handle_key(key) {
                    view.selected = 0;
                    view.clamp_selection();
                }
            }
        }
        Ok(())
    }

    fn export_users(&mut self) {
        let Some(ref view) = self.admin_view else {
            return;
        };
        let format = ExportFormat::Csv;
        let path = export::default_path(&self.config.download.dir, "users", format);
        self.status_message = Some(match export::export_users(&view.users, &path, format) {
            Ok(count) => format!("Exported {} players to {}", count, path.display()),
            Err(e) => {
                tracing::error!(error = %e, "User export failed");
                format!("Export failed: {:#}", e)
            }
        });
    }

    fn handle_entry_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(ref mut form) = self.entry_form else {
            self.mode = AppMode::Admin;
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => {
                if form.busy {
                    self.status_message =
                        Some("Entry already sent; the dex reloads when it lands".to_string());
                }
                self.entry_form = None;
                self.mode = AppMode::Admin;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Enter => {
                if form.busy {
                    return Ok(());
                }
                match form.to_entry() {
                    Ok(entry) => {
                        let client = self.client.clone();
                        let started = self.task_manager.spawn(TaskType::CreateEntry, async move {
                            client.create_entry(&entry).await?;
                            Ok((format!("{} added to the catalog", entry.common_name), TaskOutcome::Nothing))
                        });
                        if started.is_some() {
                            form.busy = true;
                            form.error = None;
                        }
                    }
                    Err(message) => form.error = Some(capitalise(&message)),
                }
            }
            _ => {
                if form.focused_input().handle_key(key) {
                    form.error = None;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animaldex::models::{CatalogEntry, UnlockRecord};
    use animaldex::tasks::TaskId;
    use ratatui_image::picker::Picker;
    use serde_json::json;

    fn logged_out_app(dir: &tempfile::TempDir) -> App {
        let mut config = Config::default();
        config.session.path = dir.path().join("session.json");
        config.download.dir = dir.path().join("downloads");
        App::new(config).unwrap()
    }

    fn snapshot() -> CatalogSnapshot {
        let entries: Vec<CatalogEntry> = serde_json::from_value(json!([
            {"id": 1, "commonName": "Isard", "scientificName": "Rupicapra pyrenaica", "category": "Mammal"},
            {"id": 2, "commonName": "Trencalòs", "scientificName": "Gypaetus barbatus", "category": "Bird"},
            {"id": 3, "commonName": "Guineu", "scientificName": "Vulpes vulpes", "category": "Mammal"}
        ]))
        .unwrap();
        let unlocks: Vec<UnlockRecord> = serde_json::from_value(json!([
            {"id": 10, "animalId": 3, "status": "UNLOCK", "photos": [
                {"id": 100, "fileName": "a.jpg", "userAnimalId": 10},
                {"id": 101, "fileName": "b.png", "userAnimalId": 10}
            ]}
        ]))
        .unwrap();
        CatalogSnapshot::new(entries, unlocks)
    }

    /// The fixture after Isard was unlocked.
    fn snapshot_with_isard_unlocked() -> CatalogSnapshot {
        let base = snapshot();
        let mut unlocks = base.unlocks().to_vec();
        unlocks.push(
            serde_json::from_value(json!({"id": 11, "animalId": 1, "status": "UNLOCK"})).unwrap(),
        );
        CatalogSnapshot::new(base.entries().to_vec(), unlocks)
    }

    fn completed(task_type: TaskType, outcome: TaskOutcome) -> TaskCompletionInfo {
        TaskCompletionInfo {
            id: TaskId::new(),
            task_type,
            state: TaskState::Completed,
            message: "done".to_string(),
            outcome,
            error: None,
        }
    }

    fn failed(task_type: TaskType, error: ApiError) -> TaskCompletionInfo {
        TaskCompletionInfo {
            id: TaskId::new(),
            task_type,
            state: TaskState::Failed,
            message: error.to_string(),
            outcome: TaskOutcome::Nothing,
            error: Some(error),
        }
    }

    fn isard_locked(app: &App) -> bool {
        app.view.get(1).unwrap().locked
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    #[test]
    fn test_starts_at_login_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = logged_out_app(&dir);
        assert_eq!(app.mode, AppMode::Login);
        assert!(!app.task_manager.has_running_tasks());
    }

    #[test]
    fn test_filters_and_selection_survive_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());
        assert_eq!(app.visible.len(), 3);
        assert_eq!(app.category_choices, vec!["Mammal", "Bird"]);

        // Select Guineu, then refresh: it stays selected
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.selected_item().unwrap().entry.id, 3);
        app.apply_snapshot(snapshot());
        assert_eq!(app.selected_item().unwrap().entry.id, 3);

        // Category cycle narrows to mammals
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.visible.len(), 2);

        // Status cycle: locked mammals only
        press(&mut app, KeyCode::Char('s'));
        let names: Vec<_> = app.visible_entries().map(|e| e.entry.common_name.as_str()).collect();
        assert_eq!(names, vec!["Isard"]);

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.visible.len(), 3);
    }

    #[test]
    fn test_search_is_live_and_esc_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, AppMode::Searching);
        for c in "gypa".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert_eq!(app.visible.len(), 1);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Dex);
        assert_eq!(app.visible.len(), 3);
    }

    #[test]
    fn test_photo_pane_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        // Locked animal: no photo pane
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Pane::List);

        press(&mut app, KeyCode::Char('G'));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Pane::Photos);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_photo().unwrap().id, 101);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.photo_index, 1);
    }

    #[test]
    fn test_add_photo_to_locked_animal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.mode, AppMode::Dex);
        assert!(app.photo_form.is_none());
        assert!(app.status_message.as_deref().unwrap().contains("not unlocked"));
        assert!(!app.task_manager.has_running_tasks());
    }

    #[test]
    fn test_admin_panel_needs_admin_role() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;

        press(&mut app, KeyCode::Char('A'));
        assert_eq!(app.mode, AppMode::Dex);
        assert!(app.admin_view.is_none());
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        press(&mut app, KeyCode::Char('G'));
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.mode, AppMode::Confirming);
        assert_eq!(
            app.confirm_dialog.as_ref().unwrap().action,
            ConfirmAction::DeletePhoto { photo_id: 100 }
        );

        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, AppMode::Dex);
        assert!(!app.task_manager.has_running_tasks());
    }

    #[test]
    fn test_export_writes_csv_into_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        press(&mut app, KeyCode::Char('E'));
        assert!(app.status_message.as_deref().unwrap().starts_with("Exported 3 animals"));
        let written = std::fs::read_dir(dir.path().join("downloads")).unwrap().count();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_older_snapshot_never_replaces_newer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;

        let refresh_started = dex::next_generation();
        let unlock_refetched = dex::next_generation();

        let after = snapshot_with_isard_unlocked().with_generation(unlock_refetched);
        app.handle_completion(completed(TaskType::Unlock, TaskOutcome::Snapshot(after)));
        assert!(!isard_locked(&app));

        // The refresh was sent before the unlock but answers after it
        let before = snapshot().with_generation(refresh_started);
        app.handle_completion(completed(TaskType::Refresh, TaskOutcome::Snapshot(before)));
        assert!(!isard_locked(&app));
        assert_eq!(app.snapshot.generation(), unlock_refetched);

        // A later refresh is applied
        let later = snapshot().with_generation(dex::next_generation());
        app.handle_completion(completed(TaskType::Refresh, TaskOutcome::Snapshot(later)));
        assert!(isard_locked(&app));
    }

    #[tokio::test]
    async fn test_slow_refresh_does_not_revert_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        let refresh_started = dex::next_generation();
        app.task_manager.supersede(TaskType::Refresh, async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let before = snapshot().with_generation(refresh_started);
            Ok(("3 animals loaded".to_string(), TaskOutcome::Snapshot(before)))
        });
        app.task_manager.spawn(TaskType::Unlock, async {
            let after = snapshot_with_isard_unlocked().with_generation(dex::next_generation());
            Ok(("Isard submitted".to_string(), TaskOutcome::Snapshot(after)))
        });

        for _ in 0..50 {
            for completion in app.task_manager.poll_updates() {
                app.handle_completion(completion);
            }
            if !app.task_manager.has_running_tasks() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!app.task_manager.has_running_tasks());
        assert!(!isard_locked(&app));
    }

    #[test]
    fn test_failures_keep_previous_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());
        press(&mut app, KeyCode::Char('G'));

        let entries = app.view.entries.clone();
        let unlocks = app.snapshot.unlocks().to_vec();

        app.handle_completion(failed(
            TaskType::Refresh,
            ApiError::Rejected("backend unavailable".into()),
        ));
        assert_eq!(app.view.entries, entries);
        assert_eq!(app.snapshot.unlocks(), unlocks.as_slice());
        assert_eq!(
            app.status_message.as_deref(),
            Some("Refresh failed: Backend unavailable")
        );

        app.handle_completion(failed(
            TaskType::Unlock,
            ApiError::Server {
                status: 500,
                message: Some("disk full".into()),
            },
        ));
        assert_eq!(app.view.entries, entries);
        assert_eq!(app.snapshot.unlocks(), unlocks.as_slice());
        assert_eq!(app.selected_item().unwrap().entry.id, 3);
        assert!(app.status_message.as_deref().unwrap().contains("disk full"));
        assert!(app.status_message.as_deref().unwrap().starts_with("Unlock failed"));
    }

    #[tokio::test]
    async fn test_esc_does_not_abandon_sent_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());

        app.task_manager.spawn(TaskType::Unlock, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok((String::new(), TaskOutcome::Nothing))
        });
        press(&mut app, KeyCode::Esc);
        assert!(app.task_manager.is_running(TaskType::Unlock));
        assert_eq!(
            app.status_message.as_deref(),
            Some("Changes already sent cannot be cancelled")
        );

        // Closing a busy entry form leaves the creation running
        app.admin_view = Some(AdminView::new());
        let mut form = EntryForm::new();
        form.busy = true;
        app.entry_form = Some(form);
        app.mode = AppMode::CreatingEntry;
        app.task_manager.spawn(TaskType::CreateEntry, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok((String::new(), TaskOutcome::Nothing))
        });
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Admin);
        assert!(app.entry_form.is_none());
        assert!(app.task_manager.is_running(TaskType::CreateEntry));

        app.task_manager.cancel_all();
    }

    #[tokio::test]
    async fn test_preview_follows_focused_photo() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = logged_out_app(&dir);
        app.mode = AppMode::Dex;
        app.apply_snapshot(snapshot());
        app.preview = PhotoPreview::with_picker(Some(Picker::from_fontsize((8, 16))));

        // Nothing is fetched from the list pane
        app.sync_preview();
        assert!(!app.task_manager.is_running(TaskType::Preview));

        press(&mut app, KeyCode::Char('G'));
        press(&mut app, KeyCode::Tab);
        app.sync_preview();
        assert_eq!(app.preview.photo_id(), Some(100));
        assert!(app.task_manager.is_running(TaskType::Preview));

        press(&mut app, KeyCode::Char('j'));
        app.sync_preview();
        assert_eq!(app.preview.photo_id(), Some(101));

        // A late image for the previous photo is not shown
        app.handle_completion(completed(
            TaskType::Preview,
            TaskOutcome::Preview {
                photo_id: 100,
                image: image::DynamicImage::new_rgb8(4, 4),
            },
        ));
        assert!(!app.preview.is_ready());

        press(&mut app, KeyCode::Tab);
        app.sync_preview();
        assert_eq!(app.preview.photo_id(), None);
        assert!(!app.task_manager.is_running(TaskType::Preview));
    }
}
