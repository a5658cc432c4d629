use axum::extract::{Extension, State};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthContext;
use crate::models::{CreateNotification, Notification};
use crate::pagination::{Paginated, PaginationQuery};
use crate::realtime::{ChangeEvent, EventBus, Table};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub unread: bool,
}

impl NotificationQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Insert a notification and push it onto the change feed.
pub(crate) fn notify(
    conn: &Connection,
    events: &EventBus,
    input: CreateNotification,
) -> Result<Notification> {
    let notification = queries::create_notification(conn, &input)?;
    events.publish(ChangeEvent::insert(
        Table::Notifications,
        &notification.id,
        &notification,
    ));
    Ok(notification)
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Paginated<Notification>>> {
    let conn = state.db.get()?;
    let pagination = query.pagination();
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (items, total) =
        queries::list_notifications_paginated(&conn, &ctx.user.id, query.unread, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    let conn = state.db.get()?;
    if !queries::mark_notification_read(&conn, &id, &ctx.user.id)? {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    let notification = queries::get_notification(&conn, &id, &ctx.user.id)?
        .ok_or_else(|| AppError::NotFound("Notification not found".into()))?;

    state.events.publish(ChangeEvent::update(
        Table::Notifications,
        &notification.id,
        &notification,
    ));
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let changed = queries::mark_all_notifications_read(&conn, &ctx.user.id)?;
    for notification in &changed {
        state.events.publish(ChangeEvent::update(
            Table::Notifications,
            &notification.id,
            notification,
        ));
    }
    Ok(Json(serde_json::json!({ "updated": changed.len() })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let existing = queries::get_notification(&conn, &id, &ctx.user.id)?
        .ok_or_else(|| AppError::NotFound("Notification not found".into()))?;
    queries::delete_notification(&conn, &id, &ctx.user.id)?;

    state
        .events
        .publish(ChangeEvent::delete(Table::Notifications, &id, &existing));
    Ok(Json(serde_json::json!({ "deleted": true })))
}
