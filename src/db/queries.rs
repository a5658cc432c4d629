use chrono::Utc;
use rusqlite::{Connection, ErrorCode, ToSql, params, types::Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    API_KEY_COLS, NOTIFICATION_COLS, PROFILE_COLS, PROJECT_COLS, SKILL_COLS, TASK_COLS,
    TEAM_MEMBER_COLS, TEAM_MEMBER_WITH_USER_COLS, USER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Hash a secret (API key) for storage/lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"teamboard-key-v1:");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn as_params(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    key_column: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            key_column: "id",
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn keyed_by(mut self, column: &'static str) -> Self {
        self.key_column = column;
        self
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Handle the `Option<Option<T>>` pattern:
    /// None = leave unchanged, Some(None) = set NULL, Some(Some(v)) = set v.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            sets.join(", "),
            self.key_column
        );
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

/// Create a user along with an empty profile row.
pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();
    let name = input.name.trim().to_string();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (id, email, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, &email, &name, now, now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already registered".into())
        } else {
            e.into()
        }
    })?;
    tx.execute(
        "INSERT INTO profiles (user_id, full_name, updated_at) VALUES (?1, ?2, ?3)",
        params![&id, &name, now],
    )?;
    tx.commit()?;

    Ok(User {
        id,
        email,
        name,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

// ============ API Keys ============

pub fn generate_api_key() -> String {
    format!("tb_{}", Uuid::new_v4().simple())
}

/// Create an API key for a user. Returns the stored key info and the full key,
/// which is never persisted.
pub fn create_api_key(conn: &Connection, user_id: &str) -> Result<(ApiKey, String)> {
    let id = gen_id();
    let now = now();
    let key = generate_api_key();
    let prefix = key[..8].to_string();
    let key_hash = hash_secret(&key);

    conn.execute(
        "INSERT INTO api_keys (id, user_id, prefix, key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, user_id, &prefix, &key_hash, now],
    )?;

    Ok((
        ApiKey {
            id,
            user_id: user_id.to_string(),
            prefix,
            key_hash,
            created_at: now,
            last_used_at: None,
        },
        key,
    ))
}

/// Get user by API key. Returns the user and key info if found.
pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<(User, ApiKey)>> {
    let hash = hash_secret(api_key);

    let key: Option<ApiKey> = query_one(
        conn,
        &format!("SELECT {} FROM api_keys WHERE key_hash = ?1", API_KEY_COLS),
        &[&hash],
    )?;

    if let Some(key) = key {
        // Best effort; a failed touch must not fail the request
        let _ = conn.execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
            params![now(), &key.id],
        );

        if let Some(user) = get_user_by_id(conn, &key.user_id)? {
            return Ok(Some((user, key)));
        }
    }

    Ok(None)
}

// ============ Profiles ============

pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLS),
        &[&user_id],
    )
}

pub fn update_profile(conn: &Connection, user_id: &str, input: &UpdateProfile) -> Result<bool> {
    UpdateBuilder::new("profiles", user_id)
        .keyed_by("user_id")
        .with_updated_at()
        .set_nullable("full_name", input.full_name.clone())
        .set_nullable("bio", input.bio.clone())
        .set_nullable("location", input.location.clone())
        .set_nullable("avatar_url", input.avatar_url.clone())
        .set_nullable("github_url", input.github_url.clone())
        .set_nullable("linkedin_url", input.linkedin_url.clone())
        .execute(conn)
}

pub fn set_profile_resume_url(conn: &Connection, user_id: &str, url: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE profiles SET resume_url = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![url, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Skills ============

pub fn list_skills_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Skill>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM skills WHERE user_id = ?1 ORDER BY name COLLATE NOCASE",
            SKILL_COLS
        ),
        &[&user_id],
    )
}

pub fn create_skill(conn: &Connection, user_id: &str, input: &CreateSkill) -> Result<Skill> {
    let id = gen_id();
    let now = now();
    let name = input.name.trim().to_string();

    conn.execute(
        "INSERT INTO skills (id, user_id, name, proficiency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, user_id, &name, input.proficiency.as_ref(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Skill '{}' already added", name))
        } else {
            e.into()
        }
    })?;

    Ok(Skill {
        id,
        user_id: user_id.to_string(),
        name,
        proficiency: input.proficiency,
        created_at: now,
    })
}

pub fn delete_skill(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM skills WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(deleted > 0)
}

// ============ Projects ============

/// Create a project and its owner membership in one transaction.
/// The owner row is inserted directly as `active`; owners never pass through `pending`.
pub fn create_project(
    conn: &Connection,
    owner_id: &str,
    input: &CreateProject,
) -> Result<(Project, TeamMember)> {
    let project_id = gen_id();
    let member_id = gen_id();
    let now = now();
    let tech_stack = serde_json::to_string(&input.tech_stack)?;
    let required_skills = serde_json::to_string(&input.required_skills)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO projects (id, owner_id, name, description, status, visibility, team_size, tech_stack, required_skills, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &project_id,
            owner_id,
            input.name.trim(),
            &input.description,
            input.status.as_ref(),
            input.visibility.as_ref(),
            input.team_size,
            &tech_stack,
            &required_skills,
            now,
            now
        ],
    )?;
    tx.execute(
        "INSERT INTO team_members (id, project_id, user_id, role, status, message, joined_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'owner', 'active', NULL, ?4, ?4, ?4)",
        params![&member_id, &project_id, owner_id, now],
    )?;
    tx.commit()?;

    let project = Project {
        id: project_id.clone(),
        owner_id: owner_id.to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        status: input.status,
        visibility: input.visibility,
        team_size: input.team_size,
        tech_stack: input.tech_stack.clone(),
        required_skills: input.required_skills.clone(),
        created_at: now,
        updated_at: now,
    };
    let owner = TeamMember {
        id: member_id,
        project_id,
        user_id: owner_id.to_string(),
        role: MemberRole::Owner,
        status: MemberStatus::Active,
        message: None,
        joined_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    Ok((project, owner))
}

pub fn get_project_by_id(conn: &Connection, id: &str) -> Result<Option<Project>> {
    query_one(
        conn,
        &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLS),
        &[&id],
    )
}

/// Public projects plus any project the user is an active member of.
pub fn list_visible_projects(conn: &Connection, user_id: &str) -> Result<Vec<Project>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM projects
             WHERE visibility = 'public'
             OR id IN (SELECT project_id FROM team_members WHERE user_id = ?1 AND status = 'active')
             ORDER BY created_at DESC",
            PROJECT_COLS
        ),
        &[&user_id],
    )
}

/// Projects the user is an active member of (including owned ones).
pub fn list_projects_for_member(conn: &Connection, user_id: &str) -> Result<Vec<Project>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM projects
             WHERE id IN (SELECT project_id FROM team_members WHERE user_id = ?1 AND status = 'active')
             ORDER BY created_at DESC",
            PROJECT_COLS
        ),
        &[&user_id],
    )
}

/// Public projects the user has no active or pending membership in.
pub fn list_joinable_projects(conn: &Connection, user_id: &str) -> Result<Vec<Project>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM projects
             WHERE visibility = 'public'
             AND id NOT IN (
                 SELECT project_id FROM team_members
                 WHERE user_id = ?1 AND status IN ('active', 'pending')
             )
             ORDER BY created_at DESC",
            PROJECT_COLS
        ),
        &[&user_id],
    )
}

pub fn count_projects_owned(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE owner_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn update_project(conn: &Connection, id: &str, input: &UpdateProject) -> Result<bool> {
    let tech_stack = input
        .tech_stack
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let required_skills = input
        .required_skills
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    UpdateBuilder::new("projects", id)
        .with_updated_at()
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_nullable("description", input.description.clone())
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("visibility", input.visibility.map(|v| v.as_ref().to_string()))
        .set_opt("team_size", input.team_size)
        .set_opt("tech_stack", tech_stack)
        .set_opt("required_skills", required_skills)
        .execute(conn)
}

/// Tasks and membership rows removed along with a project by `ON DELETE CASCADE`.
pub fn list_project_dependents(conn: &Connection, project_id: &str) -> Result<(Vec<Task>, Vec<TeamMember>)> {
    let tasks = query_all(
        conn,
        &format!("SELECT {} FROM tasks WHERE project_id = ?1", TASK_COLS),
        &[&project_id],
    )?;
    let members = query_all(
        conn,
        &format!("SELECT {} FROM team_members WHERE project_id = ?1", TEAM_MEMBER_COLS),
        &[&project_id],
    )?;
    Ok((tasks, members))
}

pub fn delete_project(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Team Members ============

pub fn create_join_request(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
    message: Option<&str>,
) -> Result<TeamMember> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO team_members (id, project_id, user_id, role, status, message, joined_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'member', 'pending', ?4, NULL, ?5, ?5)",
        params![&id, project_id, user_id, message, now],
    )?;

    Ok(TeamMember {
        id,
        project_id: project_id.to_string(),
        user_id: user_id.to_string(),
        role: MemberRole::Member,
        status: MemberStatus::Pending,
        message: message.map(String::from),
        joined_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_team_member_by_id(conn: &Connection, id: &str) -> Result<Option<TeamMember>> {
    query_one(
        conn,
        &format!("SELECT {} FROM team_members WHERE id = ?1", TEAM_MEMBER_COLS),
        &[&id],
    )
}

/// The caller's active membership in a project, if any.
pub fn get_active_membership(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<TeamMember>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM team_members
             WHERE project_id = ?1 AND user_id = ?2 AND status = 'active'",
            TEAM_MEMBER_COLS
        ),
        &[&project_id, &user_id],
    )
}

/// A pending or active membership row, used to turn away duplicate join requests.
pub fn find_open_membership(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<TeamMember>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM team_members
             WHERE project_id = ?1 AND user_id = ?2 AND status IN ('pending', 'active')
             ORDER BY created_at DESC",
            TEAM_MEMBER_COLS
        ),
        &[&project_id, &user_id],
    )
}

pub fn list_team_members(
    conn: &Connection,
    project_id: &str,
    statuses: &[MemberStatus],
) -> Result<Vec<TeamMemberWithUser>> {
    let placeholders: Vec<String> = (0..statuses.len()).map(|i| format!("?{}", i + 2)).collect();
    let mut values: Vec<Value> = vec![project_id.to_string().into()];
    values.extend(statuses.iter().map(|s| Value::from(s.as_ref().to_string())));

    query_all(
        conn,
        &format!(
            "SELECT {} FROM team_members tm
             JOIN users u ON tm.user_id = u.id
             WHERE tm.project_id = ?1 AND tm.status IN ({})
             ORDER BY tm.created_at ASC",
            TEAM_MEMBER_WITH_USER_COLS,
            placeholders.join(", ")
        ),
        &as_params(&values),
    )
}

pub fn list_memberships_for_user(conn: &Connection, user_id: &str) -> Result<Vec<TeamMember>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM team_members WHERE user_id = ?1 ORDER BY created_at DESC",
            TEAM_MEMBER_COLS
        ),
        &[&user_id],
    )
}

pub fn list_active_project_ids(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT project_id FROM team_members WHERE user_id = ?1 AND status = 'active'",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Pending join requests on projects where the user is an active owner or admin.
pub fn count_pending_requests_for_manager(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM team_members
         WHERE status = 'pending'
         AND project_id IN (
             SELECT project_id FROM team_members
             WHERE user_id = ?1 AND status = 'active' AND role IN ('owner', 'admin')
         )",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Atomically accept a pending join request.
///
/// The update only matches while the row is still `pending`, so two concurrent
/// accepts cannot both succeed.
///
/// Returns:
/// - `Ok(true)` if this call performed the transition
/// - `Ok(false)` if the row is missing, belongs to another project, or is no longer pending
pub fn try_accept_membership(conn: &Connection, id: &str, project_id: &str) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE team_members
         SET status = 'active', role = 'member', joined_at = ?1, updated_at = ?1
         WHERE id = ?2 AND project_id = ?3 AND status = 'pending'",
        params![now, id, project_id],
    )?;
    Ok(affected > 0)
}

/// Atomically reject a pending join request. Same predicate as `try_accept_membership`.
pub fn try_reject_membership(conn: &Connection, id: &str, project_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE team_members SET status = 'rejected', updated_at = ?1
         WHERE id = ?2 AND project_id = ?3 AND status = 'pending'",
        params![now(), id, project_id],
    )?;
    Ok(affected > 0)
}

pub fn update_team_member(conn: &Connection, id: &str, input: &UpdateTeamMember) -> Result<bool> {
    UpdateBuilder::new("team_members", id)
        .with_updated_at()
        .set_opt("role", input.role.map(|r| r.as_ref().to_string()))
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .execute(conn)
}

pub fn delete_team_member(conn: &Connection, id: &str, project_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM team_members WHERE id = ?1 AND project_id = ?2",
        params![id, project_id],
    )?;
    Ok(deleted > 0)
}

// ============ Tasks ============

pub fn create_task(
    conn: &Connection,
    project_id: &str,
    created_by: &str,
    input: &CreateTask,
) -> Result<Task> {
    let id = gen_id();
    let now = now();
    let title = input.title.trim().to_string();

    conn.execute(
        "INSERT INTO tasks (id, project_id, title, description, status, priority, assignee_id, created_by, due_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            project_id,
            &title,
            &input.description,
            input.status.as_ref(),
            input.priority.as_ref(),
            &input.assignee_id,
            created_by,
            &input.due_date,
            now,
            now
        ],
    )?;

    Ok(Task {
        id,
        project_id: project_id.to_string(),
        title,
        description: input.description.clone(),
        status: input.status,
        priority: input.priority,
        assignee_id: input.assignee_id.clone(),
        created_by: created_by.to_string(),
        due_date: input.due_date.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_task_by_id(conn: &Connection, id: &str) -> Result<Option<Task>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLS),
        &[&id],
    )
}

/// Tasks the user can see: those in projects where they are an active member,
/// plus any task assigned to them. No pagination.
pub fn list_visible_tasks(conn: &Connection, user_id: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
    let mut sql = format!(
        "SELECT {} FROM tasks
         WHERE (project_id IN (SELECT project_id FROM team_members WHERE user_id = ?1 AND status = 'active')
                OR assignee_id = ?1)",
        TASK_COLS
    );
    let mut values: Vec<Value> = vec![user_id.to_string().into()];

    if let Some(project_id) = &filter.project_id {
        values.push(project_id.clone().into());
        sql.push_str(&format!(" AND project_id = ?{}", values.len()));
    }
    if let Some(assignee_id) = &filter.assignee_id {
        values.push(assignee_id.clone().into());
        sql.push_str(&format!(" AND assignee_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(status.as_ref().to_string().into());
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY created_at ASC");

    query_all(conn, &sql, &as_params(&values))
}

pub fn update_task(conn: &Connection, id: &str, input: &UpdateTask) -> Result<bool> {
    UpdateBuilder::new("tasks", id)
        .with_updated_at()
        .set_opt("title", input.title.as_ref().map(|t| t.trim().to_string()))
        .set_nullable("description", input.description.clone())
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("priority", input.priority.map(|p| p.as_ref().to_string()))
        .set_nullable("assignee_id", input.assignee_id.clone())
        .set_nullable("due_date", input.due_date.clone())
        .execute(conn)
}

/// Unconditional status write. Concurrent writers are not coordinated: last write wins.
pub fn update_task_status(conn: &Connection, id: &str, status: TaskStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), now(), id],
    )?;
    Ok(affected > 0)
}

pub fn delete_task(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Notifications ============

pub fn create_notification(conn: &Connection, input: &CreateNotification) -> Result<Notification> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO notifications (id, user_id, kind, title, message, project_id, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            &id,
            &input.user_id,
            input.kind.as_ref(),
            &input.title,
            &input.message,
            &input.project_id,
            now
        ],
    )?;

    Ok(Notification {
        id,
        user_id: input.user_id.clone(),
        kind: input.kind,
        title: input.title.clone(),
        message: input.message.clone(),
        project_id: input.project_id.clone(),
        read: false,
        created_at: now,
    })
}

pub fn get_notification(conn: &Connection, id: &str, user_id: &str) -> Result<Option<Notification>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE id = ?1 AND user_id = ?2",
            NOTIFICATION_COLS
        ),
        &[&id, &user_id],
    )
}

pub fn list_notifications_paginated(
    conn: &Connection,
    user_id: &str,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Notification>, i64)> {
    let unread_clause = if unread_only { " AND read = 0" } else { "" };

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1{}",
            unread_clause
        ),
        params![user_id],
        |row| row.get(0),
    )?;

    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE user_id = ?1{}
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            NOTIFICATION_COLS, unread_clause
        ),
        params![user_id, limit, offset],
    )?;

    Ok((items, total))
}

pub fn count_unread_notifications(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_notification_read(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(affected > 0)
}

/// Mark every unread notification read. Returns the rows that changed, as they are now.
pub fn mark_all_notifications_read(conn: &Connection, user_id: &str) -> Result<Vec<Notification>> {
    let tx = conn.unchecked_transaction()?;
    let mut changed: Vec<Notification> = query_all(
        &tx,
        &format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 AND read = 0
             ORDER BY created_at ASC, rowid ASC",
            NOTIFICATION_COLS
        ),
        &[&user_id],
    )?;
    tx.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        params![user_id],
    )?;
    tx.commit()?;

    for notification in &mut changed {
        notification.read = true;
    }
    Ok(changed)
}

pub fn delete_notification(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(deleted > 0)
}
