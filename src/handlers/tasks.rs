use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::board::{Board, persist_status_change};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::handlers::notifications::notify;
use crate::middleware::{AuthContext, ProjectContext, require_active_member};
use crate::models::{
    ChangeTaskStatus, CreateNotification, CreateTask, NotificationKind, Task, TaskFilter,
    UpdateTask, User,
};
use crate::realtime::{ChangeEvent, Table};

#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    pub project_id: Option<String>,
}

/// Every visible task grouped into status columns. Not paginated.
pub async fn get_board(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Board>> {
    let conn = state.db.get()?;
    let filter = TaskFilter {
        project_id: query.project_id.clone(),
        ..Default::default()
    };
    let tasks = queries::list_visible_tasks(&conn, &ctx.user.id, &filter)?;
    Ok(Json(Board::from_tasks(query.project_id, tasks)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>> {
    let conn = state.db.get()?;
    let tasks = queries::list_visible_tasks(&conn, &ctx.user.id, &filter)?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>)> {
    ctx.require_member()?;
    input.validate()?;

    let conn = state.db.get()?;
    if let Some(assignee_id) = &input.assignee_id {
        require_assignable(&conn, &ctx.project.id, assignee_id)?;
    }

    let task = queries::create_task(&conn, &ctx.project.id, &ctx.user.id, &input)?;
    state
        .events
        .publish(ChangeEvent::insert(Table::Tasks, &task.id, &task));

    if let Some(assignee_id) = &task.assignee_id {
        notify_assignee(&state, &conn, &ctx.user, &task, assignee_id)?;
    }

    tracing::info!(task_id = %task.id, project_id = %task.project_id, "task created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>> {
    let conn = state.db.get()?;
    let task = load_visible_task(&conn, &ctx.user, &task_id)?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<String>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>> {
    input.validate()?;

    let conn = state.db.get()?;
    let existing = load_visible_task(&conn, &ctx.user, &task_id)?;
    require_active_member(&conn, &existing.project_id, &ctx.user.id)?;

    let new_assignee = match &input.assignee_id {
        Some(Some(assignee_id)) if existing.assignee_id.as_deref() != Some(assignee_id.as_str()) => {
            require_assignable(&conn, &existing.project_id, assignee_id)?;
            Some(assignee_id.clone())
        }
        _ => None,
    };

    queries::update_task(&conn, &task_id, &input)?;
    let task = queries::get_task_by_id(&conn, &task_id)?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    state
        .events
        .publish(ChangeEvent::update(Table::Tasks, &task.id, &task));

    if let Some(assignee_id) = new_assignee {
        notify_assignee(&state, &conn, &ctx.user, &task, &assignee_id)?;
    }

    Ok(Json(task))
}

/// Set a task's status. One unconditional write: concurrent changes resolve
/// to whichever lands last.
pub async fn change_task_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<String>,
    Json(input): Json<ChangeTaskStatus>,
) -> Result<Json<Task>> {
    let task = persist_status_change(&state.db, &state.events, &ctx.user.id, &task_id, input.status)?;
    tracing::debug!(task_id = %task.id, status = task.status.as_ref(), "task status changed");
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let task = load_visible_task(&conn, &ctx.user, &task_id)?;
    require_active_member(&conn, &task.project_id, &ctx.user.id)?;

    if !queries::delete_task(&conn, &task_id)? {
        return Err(AppError::NotFound("Task not found".into()));
    }
    state
        .events
        .publish(ChangeEvent::delete(Table::Tasks, &task.id, &task));

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// A task the user may see: active member of its project, or its assignee.
fn load_visible_task(conn: &Connection, user: &User, task_id: &str) -> Result<Task> {
    let task = queries::get_task_by_id(conn, task_id)?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    let visible = task.assignee_id.as_deref() == Some(user.id.as_str())
        || queries::get_active_membership(conn, &task.project_id, &user.id)?.is_some();
    if !visible {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(task)
}

fn require_assignable(conn: &Connection, project_id: &str, assignee_id: &str) -> Result<()> {
    if queries::get_active_membership(conn, project_id, assignee_id)?.is_none() {
        return Err(AppError::BadRequest(
            "Assignee must be an active member of the project".into(),
        ));
    }
    Ok(())
}

fn notify_assignee(
    state: &AppState,
    conn: &Connection,
    actor: &User,
    task: &Task,
    assignee_id: &str,
) -> Result<()> {
    if assignee_id == actor.id {
        return Ok(());
    }
    notify(
        conn,
        &state.events,
        CreateNotification {
            user_id: assignee_id.to_string(),
            kind: NotificationKind::TaskAssigned,
            title: "Task assigned".into(),
            message: format!("{} assigned you \"{}\"", actor.name, task.title),
            project_id: Some(task.project_id.clone()),
        },
    )?;
    Ok(())
}
