mod assistant;
mod dashboard;
mod members;
pub(crate) mod notifications;
mod profiles;
mod projects;
mod public;
mod realtime;
mod tasks;

pub use assistant::*;
pub use dashboard::*;
pub use members::*;
pub use notifications::*;
pub use profiles::*;
pub use projects::*;
pub use public::*;
pub use realtime::*;
pub use tasks::*;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::db::AppState;
use crate::middleware::{project_member_auth, user_auth};

/// JSON envelope overhead allowed on top of the base64-encoded upload.
const UPLOAD_ENVELOPE_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(signup))
        .route("/storage/{*key}", get(serve_storage));

    let resume_body_limit = state.storage.max_upload_bytes().div_ceil(3) * 4 + UPLOAD_ENVELOPE_BYTES;

    let user_routes = Router::new()
        .route("/me", get(get_me))
        .route("/me/profile", put(update_my_profile))
        .route("/me/memberships", get(list_my_memberships))
        .route("/me/skills", get(list_my_skills))
        .route("/me/skills", post(add_skill))
        .route("/me/skills/{id}", delete(delete_skill))
        .route(
            "/me/resume",
            post(upload_resume).layer(DefaultBodyLimit::max(resume_body_limit)),
        )
        .route("/profiles/{user_id}", get(get_profile))
        // Projects
        .route("/projects", post(create_project))
        .route("/projects", get(list_projects))
        // Tasks and board
        .route("/tasks", get(list_tasks))
        .route("/tasks/board", get(get_board))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}", put(update_task))
        .route("/tasks/{id}", delete(delete_task))
        .route("/tasks/{id}/status", patch(change_task_status))
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(delete_notification))
        // Realtime, assistant, dashboard
        .route("/realtime/{table}", get(subscribe))
        .route("/assistant/chat", post(chat))
        .route("/recommendations/projects", get(recommend_projects))
        .route("/dashboard", get(get_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), user_auth));

    let project_routes = Router::new()
        .route("/projects/{project_id}", get(get_project))
        .route("/projects/{project_id}", put(update_project))
        .route("/projects/{project_id}", delete(delete_project))
        .route("/projects/{project_id}/join", post(request_to_join))
        .route("/projects/{project_id}/members", get(list_members))
        .route(
            "/projects/{project_id}/members/{member_id}",
            put(update_member),
        )
        .route(
            "/projects/{project_id}/members/{member_id}",
            delete(remove_member),
        )
        .route(
            "/projects/{project_id}/members/{member_id}/accept",
            post(accept_member),
        )
        .route(
            "/projects/{project_id}/members/{member_id}/reject",
            post(reject_member),
        )
        .route("/projects/{project_id}/tasks", post(create_task))
        .layer(middleware::from_fn_with_state(state, project_member_auth));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(project_routes)
}

/// The full HTTP application with request tracing, ready to serve.
pub fn app(state: AppState) -> Router {
    router(state.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
