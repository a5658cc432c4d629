use std::convert::Infallible;

use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Path, Query};
use crate::middleware::AuthContext;
use crate::models::Visibility;
use crate::realtime::{RowFilter, Subscription, Table};

#[derive(Debug, Default, Deserialize)]
pub struct RealtimeQuery {
    /// `column=eq.value`
    pub filter: Option<String>,
}

/// Stream change events for one table as Server-Sent Events.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(table): Path<String>,
    Query(query): Query<RealtimeQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let table: Table = table
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown table '{}'", table)))?;
    let filter = query.filter.as_deref().map(RowFilter::parse).transpose()?;

    let subscription = build_subscription(&state, &ctx.user.id, table, filter)?;
    let subscriber = state.events.subscribe(subscription);

    tracing::debug!(user_id = %ctx.user.id, table = table.as_ref(), "realtime subscription opened");

    let events = stream::unfold(subscriber, |mut subscriber| async move {
        let change = subscriber.recv().await?;
        let event = match Event::default().event(change.table.as_ref()).json_data(&change) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode change event");
                Event::default().comment("encoding error")
            }
        };
        Some((Ok(event), subscriber))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Narrow a subscription to what the caller may see.
///
/// Notifications are always limited to the caller's own rows. Every other table
/// is limited to projects the caller is an active member of when the
/// subscription starts, plus rows that concern the caller directly: public
/// projects and projects they own, their own membership rows, tasks assigned
/// to them. Profiles are public.
fn build_subscription(
    state: &AppState,
    user_id: &str,
    table: Table,
    filter: Option<RowFilter>,
) -> Result<Subscription> {
    let mut subscription = Subscription::table(table);

    if table == Table::Notifications {
        if let Some(f) = filter
            && !(f.column == "user_id" && f.value == user_id)
        {
            subscription = subscription.filter(f);
        }
        return Ok(subscription.filter(RowFilter::eq("user_id", user_id)));
    }

    if let Some(f) = filter {
        subscription = subscription.filter(f);
    }
    if table == Table::Profiles {
        return Ok(subscription);
    }

    let conn = state.db.get()?;
    let project_ids = queries::list_active_project_ids(&conn, user_id)?;

    let subscription = match table {
        Table::Projects => subscription
            .within_projects_on("id", project_ids)
            .or_matching(RowFilter::eq("visibility", Visibility::Public.as_ref()))
            .or_matching(RowFilter::eq("owner_id", user_id)),
        Table::TeamMembers => {
            require_project_filter_in_scope(&subscription, &project_ids)?;
            subscription
                .within_projects(project_ids)
                .or_matching(RowFilter::eq("user_id", user_id))
        }
        _ => {
            require_project_filter_in_scope(&subscription, &project_ids)?;
            subscription
                .within_projects(project_ids)
                .or_matching(RowFilter::eq("assignee_id", user_id))
        }
    };

    Ok(subscription)
}

/// An explicit `project_id` filter must name a project the caller is in.
fn require_project_filter_in_scope(subscription: &Subscription, project_ids: &[String]) -> Result<()> {
    let foreign = subscription
        .filters
        .iter()
        .any(|f| f.column == "project_id" && !project_ids.contains(&f.value));
    if foreign {
        return Err(AppError::Forbidden("Not a member of this project".into()));
    }
    Ok(())
}
