//! Kanban board state: tasks grouped into status columns, with optimistic moves
//! that can be reverted and realtime patches applied by task id.
//!
//! [`Board`] is the pure state. [`BoardController`] drives it against a
//! [`TaskStore`]: a status change is applied locally first, then written to the
//! store; if the write fails the move is undone and exactly one error notice is
//! queued. Nothing is retried.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::middleware::require_active_member;
use crate::models::{Task, TaskFilter, TaskStatus};
use crate::realtime::{ChangeEvent, ChangeKind, EventBus, Table};

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    /// Restricts realtime patches to one project when set
    #[serde(skip)]
    project_id: Option<String>,
    columns: Vec<BoardColumn>,
}

/// Undo record for an optimistic move.
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    previous: Task,
    index: usize,
}

impl Board {
    pub fn empty(project_id: Option<String>) -> Self {
        Self {
            project_id,
            columns: TaskStatus::ALL
                .iter()
                .map(|&status| BoardColumn {
                    status,
                    tasks: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn from_tasks(project_id: Option<String>, tasks: Vec<Task>) -> Self {
        let mut board = Self::empty(project_id);
        for task in tasks {
            board.column_mut(task.status).push(task);
        }
        board
    }

    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        self.columns
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.tasks.as_slice())
            .unwrap_or_default()
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        let idx = TaskStatus::ALL
            .iter()
            .position(|&s| s == status)
            .unwrap_or_default();
        &mut self.columns[idx].tasks
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.id == task_id)
    }

    /// Remove a task wherever it is, returning it with its position in its column.
    fn take(&mut self, task_id: &str) -> Option<(Task, usize)> {
        for column in &mut self.columns {
            if let Some(idx) = column.tasks.iter().position(|t| t.id == task_id) {
                return Some((column.tasks.remove(idx), idx));
            }
        }
        None
    }

    fn insert_at(&mut self, task: Task, index: usize) {
        let column = self.column_mut(task.status);
        let index = index.min(column.len());
        column.insert(index, task);
    }

    /// Move a task to `to` immediately. Returns `None` when the task is not on the board.
    /// Moving a task to the status it already has leaves it in place.
    pub fn apply_move(&mut self, task_id: &str, to: TaskStatus) -> Option<PendingMove> {
        if let Some(current) = self.find(task_id)
            && current.status == to
        {
            let index = self.column(to).iter().position(|t| t.id == task_id)?;
            return Some(PendingMove {
                task_id: task_id.to_string(),
                from: to,
                to,
                previous: current.clone(),
                index,
            });
        }
        let (task, index) = self.take(task_id)?;
        let previous = task.clone();
        let mut moved = task;
        moved.status = to;
        self.column_mut(to).push(moved);

        Some(PendingMove {
            task_id: task_id.to_string(),
            from: previous.status,
            to,
            previous,
            index,
        })
    }

    /// Put the task back exactly where it was before the move.
    pub fn revert(&mut self, pending: PendingMove) {
        self.take(&pending.task_id);
        self.insert_at(pending.previous, pending.index);
    }

    /// Insert or replace a task by id. A task that stays in the same column keeps its position.
    pub fn upsert(&mut self, task: Task) {
        let out_of_scope = self
            .project_id
            .as_ref()
            .is_some_and(|scope| scope != &task.project_id);
        if out_of_scope {
            self.take(&task.id);
            return;
        }
        match self.take(&task.id) {
            Some((existing, index)) if existing.status == task.status => self.insert_at(task, index),
            _ => self.column_mut(task.status).push(task),
        }
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        self.take(task_id).map(|(task, _)| task)
    }

    /// Patch local state from a realtime event. Applying the same event twice
    /// leaves the board unchanged. Returns false for events that are not task rows.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        if event.table != Table::Tasks {
            return false;
        }
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                match serde_json::from_value::<Task>(event.record.clone()) {
                    Ok(task) => {
                        self.upsert(task);
                        true
                    }
                    Err(e) => {
                        tracing::warn!(id = %event.id, error = %e, "ignoring malformed task event");
                        false
                    }
                }
            }
            ChangeKind::Delete => {
                self.remove(&event.id);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing toast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// Backend the board reads from and writes status changes to.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>>;

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<Task>;
}

pub struct BoardController<S> {
    store: S,
    board: Board,
    notices: Vec<Notice>,
}

impl<S: TaskStore> BoardController<S> {
    pub fn new(store: S, project_id: Option<String>) -> Self {
        Self {
            store,
            board: Board::empty(project_id),
            notices: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Load all visible tasks. On failure the board is left empty and an error notice is queued.
    pub async fn load(&mut self) -> bool {
        let project_id = self.board.project_id.clone();
        match self.store.load_tasks(project_id.as_deref()).await {
            Ok(tasks) => {
                self.board = Board::from_tasks(project_id, tasks);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load board");
                self.board = Board::empty(project_id);
                self.notices.push(Notice::error(format!("Failed to load tasks: {}", e)));
                false
            }
        }
    }

    /// Optimistically move a task, then persist. A failed write reverts the move
    /// and queues one error notice; a successful one queues one info notice.
    /// Returns whether the change was persisted.
    pub async fn change_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        let Some(pending) = self.board.apply_move(task_id, status) else {
            self.notices.push(Notice::error("Task not found on board"));
            return false;
        };

        match self.store.update_status(task_id, status).await {
            Ok(task) => {
                self.notices.push(Notice::info(format!(
                    "Moved '{}' to {}",
                    task.title,
                    status.as_ref()
                )));
                true
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, "status update failed, reverting");
                self.board.revert(pending);
                self.notices
                    .push(Notice::error(format!("Failed to update task status: {}", e)));
                false
            }
        }
    }

    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        self.board.apply_change(event)
    }
}

/// [`TaskStore`] over the local database, acting as `user_id`.
#[derive(Clone)]
pub struct LocalTaskStore {
    pool: DbPool,
    user_id: String,
    events: EventBus,
}

impl LocalTaskStore {
    pub fn new(pool: DbPool, user_id: impl Into<String>, events: EventBus) -> Self {
        Self {
            pool,
            user_id: user_id.into(),
            events,
        }
    }
}

/// Set a task's status on behalf of `user_id`, who must be an active member of
/// the task's project. Publishes the update on the change feed.
pub fn persist_status_change(
    pool: &DbPool,
    events: &EventBus,
    user_id: &str,
    task_id: &str,
    status: TaskStatus,
) -> Result<Task> {
    let conn = pool.get()?;
    let task = queries::get_task_by_id(&conn, task_id)?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    require_active_member(&conn, &task.project_id, user_id)?;

    if !queries::update_task_status(&conn, task_id, status)? {
        return Err(AppError::NotFound("Task not found".into()));
    }
    let updated = queries::get_task_by_id(&conn, task_id)?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    events.publish(ChangeEvent::update(Table::Tasks, &updated.id, &updated));
    Ok(updated)
}

#[async_trait]
impl TaskStore for LocalTaskStore {
    async fn load_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>> {
        let conn = self.pool.get()?;
        let filter = TaskFilter {
            project_id: project_id.map(String::from),
            ..Default::default()
        };
        queries::list_visible_tasks(&conn, &self.user_id, &filter)
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        persist_status_change(&self.pool, &self.events, &self.user_id, task_id, status)
    }
}
