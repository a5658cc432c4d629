use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthContext;
use crate::models::{
    CreateSkill, ProfileWithSkills, ResumeUploaded, Skill, TeamMember, UpdateProfile, UploadResume,
    User,
};
use crate::realtime::{ChangeEvent, Table};
use crate::storage::{RESUME_CONTENT_TYPES, Storage};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub profile: ProfileWithSkills,
}

fn load_profile(conn: &rusqlite::Connection, user: &User) -> Result<ProfileWithSkills> {
    let profile = queries::get_profile(conn, &user.id)?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    let skills = queries::list_skills_for_user(conn, &user.id)?;
    Ok(ProfileWithSkills {
        profile,
        name: user.name.clone(),
        skills,
    })
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<MeResponse>> {
    let conn = state.db.get()?;
    let profile = load_profile(&conn, &ctx.user)?;
    Ok(Json(MeResponse {
        user: ctx.user,
        profile,
    }))
}

pub async fn list_my_memberships(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<TeamMember>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_memberships_for_user(&conn, &ctx.user.id)?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileWithSkills>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    Ok(Json(load_profile(&conn, &user)?))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<UpdateProfile>,
) -> Result<Json<ProfileWithSkills>> {
    let conn = state.db.get()?;
    queries::update_profile(&conn, &ctx.user.id, &input)?;

    let profile = load_profile(&conn, &ctx.user)?;
    state
        .events
        .publish(ChangeEvent::update(Table::Profiles, &ctx.user.id, &profile.profile));
    Ok(Json(profile))
}

pub async fn list_my_skills(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<Skill>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_skills_for_user(&conn, &ctx.user.id)?))
}

pub async fn add_skill(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<CreateSkill>,
) -> Result<(StatusCode, Json<Skill>)> {
    input.validate()?;
    let conn = state.db.get()?;
    let skill = queries::create_skill(&conn, &ctx.user.id, &input)?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn delete_skill(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    if !queries::delete_skill(&conn, &id, &ctx.user.id)? {
        return Err(AppError::NotFound("Skill not found".into()));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Store the caller's resume and record its public URL on their profile.
pub async fn upload_resume(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<UploadResume>,
) -> Result<Json<ResumeUploaded>> {
    let content_type = input.content_type.trim().to_ascii_lowercase();
    if !RESUME_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(
            "Resume must be a PDF or Word document".into(),
        ));
    }

    // Decoded size is at most 3/4 of the encoded length
    if input.data_base64.len() / 4 * 3 > state.storage.max_upload_bytes() + 3 {
        return Err(AppError::PayloadTooLarge("Resume is too large".into()));
    }
    let bytes = BASE64
        .decode(input.data_base64.trim())
        .map_err(|_| AppError::BadRequest("data_base64 is not valid base64".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Resume file is empty".into()));
    }

    let key = Storage::resume_key(&ctx.user.id, &input.file_name)?;
    let resume_url = state.storage.put(&key, &bytes).await?;

    let conn = state.db.get()?;
    queries::set_profile_resume_url(&conn, &ctx.user.id, &resume_url)?;
    if let Some(profile) = queries::get_profile(&conn, &ctx.user.id)? {
        state
            .events
            .publish(ChangeEvent::update(Table::Profiles, &ctx.user.id, &profile));
    }

    Ok(Json(ResumeUploaded {
        resume_url,
        size: bytes.len(),
    }))
}
