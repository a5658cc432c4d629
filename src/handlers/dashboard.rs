use axum::extract::{Extension, State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::{TaskFilter, TaskStatus};

#[derive(Debug, Default, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub projects_owned: i64,
    pub active_memberships: usize,
    /// Join requests on projects the caller manages
    pub pending_requests: i64,
    pub unread_notifications: i64,
    pub tasks: TaskCounts,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<DashboardSummary>> {
    let user_id = &ctx.user.id;
    let conn = state.db.get()?;

    let mut tasks = TaskCounts::default();
    for task in queries::list_visible_tasks(&conn, user_id, &TaskFilter::default())? {
        match task.status {
            TaskStatus::Pending => tasks.pending += 1,
            TaskStatus::Todo => tasks.todo += 1,
            TaskStatus::InProgress => tasks.in_progress += 1,
            TaskStatus::Completed => tasks.completed += 1,
        }
    }

    Ok(Json(DashboardSummary {
        projects_owned: queries::count_projects_owned(&conn, user_id)?,
        active_memberships: queries::list_active_project_ids(&conn, user_id)?.len(),
        pending_requests: queries::count_pending_requests_for_manager(&conn, user_id)?,
        unread_notifications: queries::count_unread_notifications(&conn, user_id)?,
        tasks,
    }))
}
