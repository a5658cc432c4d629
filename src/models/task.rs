use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

/// Lifecycle stage of a task. The field is flat: any stage may follow any other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Board column order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub created_by: String,
    /// Calendar date, `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

fn validate_due_date(due_date: &str) -> Result<()> {
    chrono::NaiveDate::parse_from_str(due_date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| AppError::BadRequest("due_date must be formatted YYYY-MM-DD".into()))
}

impl CreateTask {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Task title is required".into()));
        }
        if let Some(due) = &self.due_date {
            validate_due_date(due)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub due_date: Option<Option<String>>,
}

impl UpdateTask {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(AppError::BadRequest("Task title cannot be empty".into()));
        }
        if let Some(Some(due)) = &self.due_date {
            validate_due_date(due)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeTaskStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    pub status: Option<TaskStatus>,
}
