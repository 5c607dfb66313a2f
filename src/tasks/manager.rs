//! Background task manager for tracking and controlling concurrent tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;

use super::{
    BackgroundTask, TaskCompletionInfo, TaskId, TaskOutcome, TaskState, TaskType, TaskUpdate,
};
use crate::api::ApiError;

/// Manages all background tasks, providing centralized control and status.
pub struct BackgroundTaskManager {
    tasks: HashMap<TaskId, BackgroundTask>,
    /// Order in which tasks were added (for "most recent" cancellation).
    task_order: Vec<TaskId>,
}

impl BackgroundTaskManager {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            task_order: Vec::new(),
        }
    }

    /// Register a new background task.
    /// Returns the TaskId and a sender for the task to send updates.
    pub fn register_task(&mut self, task_type: TaskType) -> (TaskId, mpsc::Sender<TaskUpdate>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let task = BackgroundTask::new(task_type, cancel_flag.clone(), rx);
        let id = task.id;

        self.tasks.insert(id, task);
        self.task_order.push(id);

        (id, tx, cancel_flag)
    }

    /// Run `work` on the tokio runtime.
    ///
    /// Returns `None` without starting anything if a task of the same type
    /// is already running.
    pub fn spawn<F>(&mut self, task_type: TaskType, work: F) -> Option<TaskId>
    where
        F: Future<Output = Result<(String, TaskOutcome), ApiError>> + Send + 'static,
    {
        if self.is_running(task_type) {
            tracing::debug!(task = task_type.display_name(), "Task already running");
            return None;
        }
        Some(self.start(task_type, work))
    }

    /// Cancel any running task of the same type, then start `work`. Results
    /// of the replaced task are dropped.
    pub fn supersede<F>(&mut self, task_type: TaskType, work: F) -> TaskId
    where
        F: Future<Output = Result<(String, TaskOutcome), ApiError>> + Send + 'static,
    {
        self.cancel_type(task_type);
        self.start(task_type, work)
    }

    fn start<F>(&mut self, task_type: TaskType, work: F) -> TaskId
    where
        F: Future<Output = Result<(String, TaskOutcome), ApiError>> + Send + 'static,
    {
        let (id, tx, cancel_flag) = self.register_task(task_type);
        tracing::debug!(task = task_type.display_name(), id = id.0, "Starting task");

        let handle = tokio::spawn(async move {
            let result = work.await;
            let update = if cancel_flag.load(Ordering::SeqCst) {
                TaskUpdate::Cancelled
            } else {
                match result {
                    Ok((message, outcome)) => TaskUpdate::Completed { message, outcome },
                    Err(error) => TaskUpdate::Failed { error },
                }
            };
            // The receiver is gone if the manager was dropped
            let _ = tx.send(update);
        });

        if let Some(task) = self.tasks.get_mut(&id) {
            task.abort = Some(handle.abort_handle());
        }
        id
    }

    /// Check if a task of the given type is already running.
    pub fn is_running(&self, task_type: TaskType) -> bool {
        self.tasks.values().any(|t| t.task_type == task_type && t.is_running())
    }

    /// Cancel every running task of one type.
    pub fn cancel_type(&mut self, task_type: TaskType) -> usize {
        self.cancel_where(|t| t == task_type)
    }

    /// Cancel every running task matching a predicate on its type.
    pub fn cancel_where(&mut self, pred: impl Fn(TaskType) -> bool) -> usize {
        let mut cancelled = 0;
        for task in self.tasks.values() {
            if task.is_running() && pred(task.task_type) {
                task.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancel the most recently started running task that is safe to
    /// abandon. Mutations and previews are skipped.
    /// Returns true if a task was cancelled.
    pub fn cancel_most_recent(&mut self) -> bool {
        for id in self.task_order.iter().rev() {
            if let Some(task) = self.tasks.get(id) {
                if task.is_running() && task.task_type.is_cancellable() {
                    task.cancel();
                    return true;
                }
            }
        }
        false
    }

    /// Cancel all running tasks.
    pub fn cancel_all(&mut self) {
        for task in self.tasks.values() {
            if task.is_running() {
                task.cancel();
            }
        }
    }

    /// Poll all task channels for updates.
    /// Returns finished tasks; results of cancelled tasks come back as
    /// `Cancelled` with no outcome.
    pub fn poll_updates(&mut self) -> Vec<TaskCompletionInfo> {
        let mut completed = Vec::new();

        for id in self.task_order.clone() {
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };

            let update = match task.receiver.try_recv() {
                Ok(update) => update,
                Err(TryRecvError::Empty) => continue,
                // Aborted before it could report
                Err(TryRecvError::Disconnected) => TaskUpdate::Cancelled,
            };

            let update = if task.is_cancelled() {
                TaskUpdate::Cancelled
            } else {
                update
            };

            let info = match update {
                TaskUpdate::Completed { message, outcome } => {
                    task.state = TaskState::Completed;
                    TaskCompletionInfo {
                        id,
                        task_type: task.task_type,
                        state: task.state,
                        message,
                        outcome,
                        error: None,
                    }
                }
                TaskUpdate::Cancelled => {
                    task.state = TaskState::Cancelled;
                    tracing::debug!(task = task.task_type.display_name(), id = id.0, "Discarded cancelled task");
                    TaskCompletionInfo {
                        id,
                        task_type: task.task_type,
                        state: task.state,
                        message: "Cancelled".to_string(),
                        outcome: TaskOutcome::Nothing,
                        error: None,
                    }
                }
                TaskUpdate::Failed { error } => {
                    task.state = TaskState::Failed;
                    TaskCompletionInfo {
                        id,
                        task_type: task.task_type,
                        state: task.state,
                        message: error.to_string(),
                        outcome: TaskOutcome::Nothing,
                        error: Some(error),
                    }
                }
            };
            completed.push(info);
        }

        // Remove completed tasks from tracking
        for info in &completed {
            self.tasks.remove(&info.id);
            self.task_order.retain(|id| *id != info.id);
        }

        completed
    }

    /// Get all running tasks for display.
    pub fn running_tasks(&self) -> Vec<&BackgroundTask> {
        self.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.is_running())
            .collect()
    }

    /// Check if any tasks are running.
    pub fn has_running_tasks(&self) -> bool {
        self.tasks.values().any(|t| t.is_running())
    }
}

impl Default for BackgroundTaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain(manager: &mut BackgroundTaskManager, expected: usize) -> Vec<TaskCompletionInfo> {
        let mut done = Vec::new();
        for _ in 0..200 {
            done.extend(manager.poll_updates());
            if done.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        done
    }

    #[tokio::test]
    async fn test_completed_task_reports_outcome() {
        let mut manager = BackgroundTaskManager::new();
        let id = manager
            .spawn(TaskType::Download, async {
                Ok(("saved".to_string(), TaskOutcome::Saved("/tmp/x.jpg".into())))
            })
            .unwrap();

        let done = drain(&mut manager, 1).await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
        assert!(done[0].success());
        assert!(matches!(done[0].outcome, TaskOutcome::Saved(_)));
        assert!(!manager.has_running_tasks());
    }

    #[tokio::test]
    async fn test_failed_task_carries_error() {
        let mut manager = BackgroundTaskManager::new();
        manager.spawn(TaskType::Unlock, async {
            Err(ApiError::Rejected("no photo".into()))
        });

        let done = drain(&mut manager, 1).await;
        assert_eq!(done[0].state, TaskState::Failed);
        assert_eq!(done[0].message, "no photo");
        assert!(matches!(done[0].error, Some(ApiError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_same_type_blocks_second_task() {
        let mut manager = BackgroundTaskManager::new();
        let first = manager.spawn(TaskType::DeletePhoto, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok((String::new(), TaskOutcome::Nothing))
        });
        assert!(first.is_some());
        assert!(manager.is_running(TaskType::DeletePhoto));

        let second = manager.spawn(TaskType::DeletePhoto, async {
            Ok((String::new(), TaskOutcome::Nothing))
        });
        assert!(second.is_none());

        // Other types are independent
        assert!(manager
            .spawn(TaskType::Download, async { Ok((String::new(), TaskOutcome::Nothing)) })
            .is_some());
        manager.cancel_all();
    }

    #[tokio::test]
    async fn test_supersede_drops_stale_result() {
        let mut manager = BackgroundTaskManager::new();
        let stale = manager.supersede(TaskType::Refresh, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(("stale".to_string(), TaskOutcome::Nothing))
        });
        let fresh = manager.supersede(TaskType::Refresh, async {
            Ok(("fresh".to_string(), TaskOutcome::Nothing))
        });

        let done = drain(&mut manager, 2).await;
        let stale_info = done.iter().find(|i| i.id == stale).unwrap();
        let fresh_info = done.iter().find(|i| i.id == fresh).unwrap();
        assert_eq!(stale_info.state, TaskState::Cancelled);
        assert_eq!(fresh_info.message, "fresh");
        assert!(fresh_info.success());
    }

    #[tokio::test]
    async fn test_cancel_most_recent_leaves_mutations_alone() {
        let mut manager = BackgroundTaskManager::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok((String::new(), TaskOutcome::Nothing))
        };
        manager.spawn(TaskType::Refresh, slow());
        manager.spawn(TaskType::Unlock, slow());

        // The unlock is newer but may already be committed
        assert!(manager.cancel_most_recent());
        assert!(manager.is_running(TaskType::Unlock));
        assert!(!manager.is_running(TaskType::Refresh));

        assert!(!manager.cancel_most_recent());
        assert!(manager.is_running(TaskType::Unlock));
        manager.cancel_all();
    }

    #[tokio::test]
    async fn test_cancel_where_by_view() {
        let mut manager = BackgroundTaskManager::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok((String::new(), TaskOutcome::Nothing))
        };
        manager.spawn(TaskType::Refresh, slow());
        manager.spawn(TaskType::LoadUsers, slow());

        assert_eq!(manager.cancel_where(|t| t.is_admin_task()), 1);
        assert!(manager.is_running(TaskType::Refresh));
        assert!(!manager.is_running(TaskType::LoadUsers));

        let done = drain(&mut manager, 1).await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].task_type, TaskType::LoadUsers);
        assert_eq!(done[0].state, TaskState::Cancelled);
        manager.cancel_all();
    }
}
