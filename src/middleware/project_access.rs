use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{MemberRole, Project, TeamMember, User, Visibility};

use super::{AuthContext, authenticate_user};

/// The caller's view of one project: the project row plus their active membership, if any.
#[derive(Clone)]
pub struct ProjectContext {
    pub user: User,
    pub project: Project,
    pub membership: Option<TeamMember>,
}

impl ProjectContext {
    pub fn require_member(&self) -> Result<&TeamMember> {
        self.membership
            .as_ref()
            .ok_or_else(|| AppError::Forbidden("Not a member of this project".into()))
    }

    /// Active owner or admin.
    pub fn require_manager(&self) -> Result<&TeamMember> {
        match &self.membership {
            Some(m) if m.can_manage() => Ok(m),
            _ => Err(AppError::Forbidden("Owner or admin role required".into())),
        }
    }

    pub fn require_owner(&self) -> Result<&TeamMember> {
        match &self.membership {
            Some(m) if m.role == MemberRole::Owner => Ok(m),
            _ => Err(AppError::Forbidden("Only the project owner can do this".into())),
        }
    }
}

/// Load a project as seen by `user_id`.
/// Private projects are reported as missing to non-members.
pub fn load_project_context(conn: &Connection, project_id: &str, user: User) -> Result<ProjectContext> {
    let project = queries::get_project_by_id(conn, project_id)?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    let membership = queries::get_active_membership(conn, project_id, &user.id)?;

    if project.visibility == Visibility::Private && membership.is_none() {
        return Err(AppError::NotFound("Project not found".into()));
    }

    Ok(ProjectContext {
        user,
        project,
        membership,
    })
}

/// The caller's active membership in a project, or `Forbidden`.
pub fn require_active_member(conn: &Connection, project_id: &str, user_id: &str) -> Result<TeamMember> {
    queries::get_active_membership(conn, project_id, user_id)?
        .ok_or_else(|| AppError::Forbidden("Not a member of this project".into()))
}

/// Authenticate the caller and load the `{project_id}` path segment into a [`ProjectContext`].
pub async fn project_member_auth(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, Response> {
    use axum::response::IntoResponse;

    let project_id = params
        .get("project_id")
        .ok_or_else(|| StatusCode::BAD_REQUEST.into_response())?;

    let user = authenticate_user(&state, request.headers()).map_err(IntoResponse::into_response)?;

    let conn = state
        .db
        .get()
        .map_err(|e| AppError::from(e).into_response())?;
    let ctx = load_project_context(&conn, project_id, user.clone())
        .map_err(IntoResponse::into_response)?;
    drop(conn);

    request.extensions_mut().insert(AuthContext { user });
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
