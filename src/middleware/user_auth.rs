use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::User;
use crate::util::extract_bearer_token;

#[derive(Clone)]
pub struct AuthContext {
    pub user: User,
}

/// Resolve the calling user from the bearer API key.
pub(crate) fn authenticate_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let api_key = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let conn = state.db.get()?;

    let (user, _key) = queries::get_user_by_api_key(&conn, api_key)?.ok_or(AppError::Unauthorized)?;

    Ok(user)
}

pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate_user(&state, request.headers())?;
    request.extensions_mut().insert(AuthContext { user });
    Ok(next.run(request).await)
}
