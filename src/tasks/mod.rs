//! Background task management for non-blocking backend calls.
//!
//! Every network operation runs as a tokio task and reports back over a
//! channel the UI loop drains once per frame, so the terminal never blocks
//! on the backend.

pub mod manager;

use image::DynamicImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiError;
use crate::dex::CatalogSnapshot;
use crate::models::{AuthResponse, Character, UserSummary};

pub use manager::BackgroundTaskManager;

/// Unique identifier for a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    pub fn new() -> Self {
        use std::sync::atomic::AtomicU64;
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TaskId(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Refresh,
    Login,
    Register,
    Unlock,
    AddPhoto,
    EditPhoto,
    DeletePhoto,
    Download,
    Preview,
    LoadUsers,
    CreateEntry,
}

impl TaskType {
    /// Short display name for status bar.
    pub fn short_name(&self) -> &'static str {
        match self {
            TaskType::Refresh => "R",
            TaskType::Login => "L",
            TaskType::Register => "N",
            TaskType::Unlock => "U",
            TaskType::AddPhoto => "A",
            TaskType::EditPhoto => "E",
            TaskType::DeletePhoto => "X",
            TaskType::Download => "D",
            TaskType::Preview => "I",
            TaskType::LoadUsers => "P",
            TaskType::CreateEntry => "C",
        }
    }

    /// Full display name for messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskType::Refresh => "Refresh",
            TaskType::Login => "Login",
            TaskType::Register => "Registration",
            TaskType::Unlock => "Unlock",
            TaskType::AddPhoto => "Add Photo",
            TaskType::EditPhoto => "Edit Photo",
            TaskType::DeletePhoto => "Delete Photo",
            TaskType::Download => "Download",
            TaskType::Preview => "Preview",
            TaskType::LoadUsers => "Load Users",
            TaskType::CreateEntry => "Create Entry",
        }
    }

    pub fn is_admin_task(&self) -> bool {
        matches!(self, TaskType::LoadUsers | TaskType::CreateEntry)
    }

    /// Tasks that change state on the backend. Once sent they may already
    /// have been applied, so they are never cancelled on the user's behalf.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            TaskType::Unlock
                | TaskType::AddPhoto
                | TaskType::EditPhoto
                | TaskType::DeletePhoto
                | TaskType::CreateEntry
        )
    }

    /// Whether Esc may abandon this task. Previews follow the focused photo
    /// on their own.
    pub fn is_cancellable(&self) -> bool {
        !self.is_mutation() && *self != TaskType::Preview
    }
}

/// What a successful task hands back to the UI.
#[derive(Debug)]
pub enum TaskOutcome {
    Nothing,
    /// A fresh catalog and ledger.
    Snapshot(CatalogSnapshot),
    Authenticated {
        auth: AuthResponse,
        character: Option<Character>,
    },
    /// Decoded image of one photo, for the preview pane.
    Preview { photo_id: i64, image: DynamicImage },
    Users(Vec<UserSummary>),
    /// A file was written.
    Saved(PathBuf),
}

/// State of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Update messages sent from background tasks via channels.
#[derive(Debug)]
pub enum TaskUpdate {
    /// Task completed successfully.
    Completed { message: String, outcome: TaskOutcome },
    /// Task was cancelled.
    Cancelled,
    /// Task failed with error.
    Failed { error: ApiError },
}

/// A running background task with its state and communication channels.
pub struct BackgroundTask {
    pub id: TaskId,
    pub task_type: TaskType,
    pub state: TaskState,
    pub cancel_flag: Arc<AtomicBool>,
    pub receiver: mpsc::Receiver<TaskUpdate>,
    pub abort: Option<tokio::task::AbortHandle>,
    pub started_at: Instant,
}

impl BackgroundTask {
    /// Create a new background task.
    pub fn new(
        task_type: TaskType,
        cancel_flag: Arc<AtomicBool>,
        receiver: mpsc::Receiver<TaskUpdate>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            state: TaskState::Running,
            cancel_flag,
            receiver,
            abort: None,
            started_at: Instant::now(),
        }
    }

    /// Request cancellation of this task. Whatever it reports afterwards is
    /// discarded.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        if let Some(ref abort) = self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Get elapsed time since task started.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Check if task is still running and has not been cancelled.
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running && !self.is_cancelled()
    }
}

/// Result of polling task updates.
#[derive(Debug)]
pub struct TaskCompletionInfo {
    pub id: TaskId,
    pub task_type: TaskType,
    pub state: TaskState,
    pub message: String,
    pub outcome: TaskOutcome,
    pub error: Option<ApiError>,
}

impl TaskCompletionInfo {
    pub fn success(&self) -> bool {
        self.state == TaskState::Completed
    }
}
