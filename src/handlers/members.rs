use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::handlers::notifications::notify;
use crate::middleware::ProjectContext;
use crate::models::{
    CreateNotification, JoinRequest, MemberRole, MemberStatus, NotificationKind, TeamMember,
    TeamMemberWithUser, UpdateTeamMember,
};
use crate::realtime::{ChangeEvent, Table};

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MemberPath {
    pub project_id: String,
    pub member_id: String,
}

/// Ask to join a project. Creates a `pending` membership and notifies the owner.
pub async fn request_to_join(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Json(request): Json<JoinRequest>,
) -> Result<(StatusCode, Json<TeamMember>)> {
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let conn = state.db.get()?;

    // Best-effort: two simultaneous requests can both pass this check.
    if let Some(existing) = queries::find_open_membership(&conn, &ctx.project.id, &ctx.user.id)? {
        let msg = match existing.status {
            MemberStatus::Active => "Already a member of this project",
            _ => "A join request is already pending",
        };
        return Err(AppError::Conflict(msg.into()));
    }

    let member = queries::create_join_request(&conn, &ctx.project.id, &ctx.user.id, message)?;
    state
        .events
        .publish(ChangeEvent::insert(Table::TeamMembers, &member.id, &member));

    notify(
        &conn,
        &state.events,
        CreateNotification {
            user_id: ctx.project.owner_id.clone(),
            kind: NotificationKind::JoinRequest,
            title: "New join request".into(),
            message: format!("{} asked to join {}", ctx.user.name, ctx.project.name),
            project_id: Some(ctx.project.id.clone()),
        },
    )?;

    tracing::info!(project_id = %ctx.project.id, user_id = %ctx.user.id, "join request created");

    Ok((StatusCode::CREATED, Json(member)))
}

/// Active members see the roster; owners and admins also see pending requests
/// and inactive rows.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Query(query): Query<MemberQuery>,
) -> Result<Json<Vec<TeamMemberWithUser>>> {
    let membership = ctx.require_member()?;

    let allowed: &[MemberStatus] = if membership.can_manage() {
        &[MemberStatus::Pending, MemberStatus::Active, MemberStatus::Inactive]
    } else {
        &[MemberStatus::Active]
    };

    let statuses: Vec<MemberStatus> = match query.status {
        Some(s) if allowed.contains(&s) => vec![s],
        Some(_) => Vec::new(),
        None => allowed.to_vec(),
    };
    if statuses.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let conn = state.db.get()?;
    let members = queries::list_team_members(&conn, &ctx.project.id, &statuses)?;
    Ok(Json(members))
}

pub async fn accept_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Path(path): Path<MemberPath>,
) -> Result<Json<TeamMember>> {
    decide(state, ctx, &path.member_id, true).await
}

pub async fn reject_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Path(path): Path<MemberPath>,
) -> Result<Json<TeamMember>> {
    decide(state, ctx, &path.member_id, false).await
}

async fn decide(
    state: AppState,
    ctx: ProjectContext,
    member_id: &str,
    accept: bool,
) -> Result<Json<TeamMember>> {
    ctx.require_manager()?;

    let conn = state.db.get()?;
    let transitioned = if accept {
        queries::try_accept_membership(&conn, member_id, &ctx.project.id)?
    } else {
        queries::try_reject_membership(&conn, member_id, &ctx.project.id)?
    };

    let member = queries::get_team_member_by_id(&conn, member_id)?
        .filter(|m| m.project_id == ctx.project.id)
        .ok_or_else(|| AppError::NotFound("Membership not found".into()))?;

    if !transitioned {
        return Err(AppError::Conflict("Membership request is not pending".into()));
    }

    state
        .events
        .publish(ChangeEvent::update(Table::TeamMembers, &member.id, &member));

    let (kind, title, verb) = if accept {
        (NotificationKind::RequestAccepted, "Join request accepted", "accepted")
    } else {
        (NotificationKind::RequestRejected, "Join request declined", "declined")
    };
    notify(
        &conn,
        &state.events,
        CreateNotification {
            user_id: member.user_id.clone(),
            kind,
            title: title.into(),
            message: format!("Your request to join {} was {}", ctx.project.name, verb),
            project_id: Some(ctx.project.id.clone()),
        },
    )?;

    tracing::info!(
        project_id = %ctx.project.id,
        member_id = %member.id,
        decided_by = %ctx.user.id,
        accepted = accept,
        "join request decided"
    );

    Ok(Json(member))
}

/// Owner-only role and status changes. The owner row itself is fixed.
pub async fn update_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Path(path): Path<MemberPath>,
    Json(input): Json<UpdateTeamMember>,
) -> Result<Json<TeamMember>> {
    ctx.require_owner()?;

    if input.role == Some(MemberRole::Owner) {
        return Err(AppError::BadRequest("role cannot be set to owner".into()));
    }
    if let Some(status) = input.status
        && !matches!(status, MemberStatus::Active | MemberStatus::Inactive)
    {
        return Err(AppError::BadRequest(
            "status must be 'active' or 'inactive'".into(),
        ));
    }

    let conn = state.db.get()?;
    let existing = load_member(&conn, &ctx, &path.member_id)?;
    if existing.role == MemberRole::Owner {
        return Err(AppError::Forbidden("The owner membership cannot be changed".into()));
    }
    if matches!(existing.status, MemberStatus::Pending | MemberStatus::Rejected)
        && input.status.is_some()
    {
        return Err(AppError::Conflict(
            "Join requests are decided through accept or reject".into(),
        ));
    }

    queries::update_team_member(&conn, &existing.id, &input)?;
    let member = load_member(&conn, &ctx, &existing.id)?;
    state
        .events
        .publish(ChangeEvent::update(Table::TeamMembers, &member.id, &member));

    Ok(Json(member))
}

/// Remove a member, or leave a project by removing yourself.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<ProjectContext>,
    Path(path): Path<MemberPath>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let member = load_member(&conn, &ctx, &path.member_id)?;

    if member.role == MemberRole::Owner {
        return Err(AppError::Forbidden("The project owner cannot be removed".into()));
    }

    let is_self = member.user_id == ctx.user.id;
    if !is_self {
        ctx.require_manager()?;
    }

    if !queries::delete_team_member(&conn, &member.id, &ctx.project.id)? {
        return Err(AppError::NotFound("Membership not found".into()));
    }
    state
        .events
        .publish(ChangeEvent::delete(Table::TeamMembers, &member.id, &member));

    if !is_self && member.status == MemberStatus::Active {
        notify(
            &conn,
            &state.events,
            CreateNotification {
                user_id: member.user_id.clone(),
                kind: NotificationKind::MemberRemoved,
                title: "Removed from project".into(),
                message: format!("You were removed from {}", ctx.project.name),
                project_id: Some(ctx.project.id.clone()),
            },
        )?;
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

fn load_member(
    conn: &rusqlite::Connection,
    ctx: &ProjectContext,
    member_id: &str,
) -> Result<TeamMember> {
    queries::get_team_member_by_id(conn, member_id)?
        .filter(|m| m.project_id == ctx.project.id)
        .ok_or_else(|| AppError::NotFound("Membership not found".into()))
}
