use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::middleware::{AuthContext, ProjectContext};
use crate::models::{CreateProject, Project, ProjectStatus, TeamMember, UpdateProject, Visibility};
use crate::realtime::{ChangeEvent, Table};
use crate::util::filter_projects;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    /// Case-insensitive substring over name and description
    pub q: Option<String>,
    pub status: Option<ProjectStatus>,
    pub visibility: Option<Visibility>,
    /// Only projects the caller is an active member of
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub membership: Option<TeamMember>,
}

/// Create a project owned by the caller. The owner joins as an active member immediately.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<CreateProject>,
) -> Result<(StatusCode, Json<Project>)> {
    input.validate()?;

    let conn = state.db.get()?;
    let (project, owner) = queries::create_project(&conn, &ctx.user.id, &input)?;

    state
        .events
        .publish(ChangeEvent::insert(Table::Projects, &project.id, &project));
    state
        .events
        .publish(ChangeEvent::insert(Table::TeamMembers, &owner.id, &owner));

    tracing::info!(project_id = %project.id, owner_id = %ctx.user.id, "project created");

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<Project>>> {
    let conn = state.db.get()?;
    let projects = if query.mine {
        queries::list_projects_for_member(&conn, &ctx.user.id)?
    } else {
        queries::list_visible_projects(&conn, &ctx.user.id)?
    };

    let projects: Vec<Project> = projects
        .into_iter()
        .filter(|p| query.status.is_none_or(|s| p.status == s))
        .filter(|p| query.visibility.is_none_or(|v| p.visibility == v))
        .collect();

    let projects = match &query.q {
        Some(q) => filter_projects(projects, q),
        None => projects,
    };

    Ok(Json(projects))
}

pub async fn get_project(Extension(ctx): Extension<ProjectContext>) -> Result<Json<ProjectDetail>> {
    Ok(Json(ProjectDetail {
        project: ctx.project,
        membership: ctx.membership,
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Json(input): Json<UpdateProject>,
) -> Result<Json<Project>> {
    ctx.require_manager()?;
    input.validate()?;

    let conn = state.db.get()?;
    queries::update_project(&conn, &ctx.project.id, &input)?;

    let project = queries::get_project_by_id(&conn, &ctx.project.id)?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    state
        .events
        .publish(ChangeEvent::update(Table::Projects, &project.id, &project));

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
) -> Result<Json<serde_json::Value>> {
    ctx.require_owner()?;

    let conn = state.db.get()?;
    let (tasks, members) = queries::list_project_dependents(&conn, &ctx.project.id)?;
    if !queries::delete_project(&conn, &ctx.project.id)? {
        return Err(AppError::NotFound("Project not found".into()));
    }

    for task in &tasks {
        state.events.publish(ChangeEvent::delete(Table::Tasks, &task.id, task));
    }
    for member in &members {
        state
            .events
            .publish(ChangeEvent::delete(Table::TeamMembers, &member.id, member));
    }
    state
        .events
        .publish(ChangeEvent::delete(Table::Projects, &ctx.project.id, &ctx.project));
    tracing::info!(project_id = %ctx.project.id, "project deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
