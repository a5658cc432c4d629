//! In-process realtime change feed.
//!
//! Every mutation publishes a [`ChangeEvent`] on the [`EventBus`]. Consumers
//! subscribe by table and optional row filters (`column=eq.value`) and receive
//! matching events in publish order. Delivery is best-effort: a subscriber
//! that falls behind the channel capacity skips the events it missed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, EnumString};
use tokio::sync::broadcast;

use crate::error::{AppError, Result};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Projects,
    Tasks,
    TeamMembers,
    Notifications,
    Profiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: String,
    /// Row after the change; for deletes, the row as it was before removal.
    pub record: Value,
}

impl ChangeEvent {
    fn new<T: Serialize>(table: Table, kind: ChangeKind, id: &str, record: &T) -> Self {
        Self {
            table,
            kind,
            id: id.to_string(),
            record: serde_json::to_value(record).unwrap_or(Value::Null),
        }
    }

    pub fn insert<T: Serialize>(table: Table, id: &str, record: &T) -> Self {
        Self::new(table, ChangeKind::Insert, id, record)
    }

    pub fn update<T: Serialize>(table: Table, id: &str, record: &T) -> Self {
        Self::new(table, ChangeKind::Update, id, record)
    }

    pub fn delete<T: Serialize>(table: Table, id: &str, record: &T) -> Self {
        Self::new(table, ChangeKind::Delete, id, record)
    }

    /// Column value rendered as a string, for filter comparison.
    fn column(&self, column: &str) -> Option<String> {
        match self.record.get(column)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Equality filter on a record column, written `column=eq.value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || AppError::BadRequest(format!("Invalid filter '{}', expected column=eq.value", raw));

        let (column, rest) = raw.split_once('=').ok_or_else(invalid)?;
        let value = rest.strip_prefix("eq.").ok_or_else(invalid)?;
        let column = column.trim();
        if column.is_empty()
            || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid());
        }
        Ok(Self::eq(column, value))
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.column(&self.column).as_deref() == Some(self.value.as_str())
    }
}

/// Limits delivery to records belonging to a fixed set of projects.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    /// Record column holding the project id (`id` for project rows).
    pub column: &'static str,
    pub project_ids: HashSet<String>,
    /// Records matching any of these are delivered whatever their project.
    pub also: Vec<RowFilter>,
}

impl ProjectScope {
    fn admits(&self, event: &ChangeEvent) -> bool {
        event
            .column(self.column)
            .is_some_and(|project_id| self.project_ids.contains(&project_id))
            || self.also.iter().any(|f| f.matches(event))
    }
}

/// What a subscriber wants to see.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub table: Table,
    pub filters: Vec<RowFilter>,
    pub scope: Option<ProjectScope>,
}

impl Subscription {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            scope: None,
        }
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Only deliver records whose `project_id` is in `project_ids`.
    pub fn within_projects(self, project_ids: impl IntoIterator<Item = String>) -> Self {
        self.within_projects_on("project_id", project_ids)
    }

    pub fn within_projects_on(
        mut self,
        column: &'static str,
        project_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let also = self.scope.take().map(|s| s.also).unwrap_or_default();
        self.scope = Some(ProjectScope {
            column,
            project_ids: project_ids.into_iter().collect(),
            also,
        });
        self
    }

    /// Let records matching `filter` through the project scope. No effect without a scope.
    pub fn or_matching(mut self, filter: RowFilter) -> Self {
        if let Some(scope) = &mut self.scope {
            scope.also.push(filter);
        }
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        if !self.filters.iter().all(|f| f.matches(event)) {
            return false;
        }
        self.scope.as_ref().is_none_or(|scope| scope.admits(event))
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Having none is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            table = event.table.as_ref(),
            kind = event.kind.as_ref(),
            id = %event.id,
            "change event"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, subscription: Subscription) -> Subscriber {
        Subscriber {
            receiver: self.sender.subscribe(),
            subscription,
        }
    }
}

pub struct Subscriber {
    receiver: broadcast::Receiver<ChangeEvent>,
    subscription: Subscription,
}

impl Subscriber {
    /// Wait for the next matching event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.subscription.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        table = self.subscription.table.as_ref(),
                        skipped,
                        "realtime subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
