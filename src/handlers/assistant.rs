use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::ProjectRecommendation;
use crate::util::matching_skills;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub cached: bool,
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("AI assistant is not configured".into()))?;

    let message = input.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message is required".into()));
    }
    let context = input
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let answer = assistant.ask(message, context).await?;
    tracing::debug!(user_id = %ctx.user.id, cached = answer.cached, "assistant replied");

    Ok(Json(ChatResponse {
        reply: answer.text,
        cached: answer.cached,
    }))
}

/// Public projects the caller has not joined, ranked by how many of their
/// required skills the caller has. Projects with no overlap are left out.
pub async fn recommend_projects(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<ProjectRecommendation>>> {
    let conn = state.db.get()?;
    let skills: Vec<String> = queries::list_skills_for_user(&conn, &ctx.user.id)?
        .into_iter()
        .map(|s| s.name)
        .collect();

    let mut recommendations: Vec<ProjectRecommendation> =
        queries::list_joinable_projects(&conn, &ctx.user.id)?
            .into_iter()
            .filter_map(|project| {
                let matched_skills = matching_skills(&project.required_skills, &skills);
                (!matched_skills.is_empty()).then(|| ProjectRecommendation {
                    score: matched_skills.len(),
                    matched_skills,
                    project,
                })
            })
            .collect();

    // Stable: ties keep newest-first order from the query.
    recommendations.sort_by(|a, b| b.score.cmp(&a.score));

    Ok(Json(recommendations))
}
