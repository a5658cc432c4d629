use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::{CreateUser, SignupResponse};
use crate::storage::content_type_for;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Register a user. The API key in the response is shown only once.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    input.validate()?;

    let conn = state.db.get()?;
    if queries::get_user_by_email(&conn, &input.email)?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = queries::create_user(&conn, &input)?;
    let (_key, api_key) = queries::create_api_key(&conn, &user.id)?;

    tracing::info!(user_id = %user.id, "user signed up");

    Ok((StatusCode::CREATED, Json(SignupResponse { user, api_key })))
}

/// Serve a stored object by key.
pub async fn serve_storage(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let bytes = state
        .storage
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes).into_response())
}
