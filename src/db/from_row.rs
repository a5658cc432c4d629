use std::str::FromStr;

use rusqlite::{Connection, Row, ToSql, types::Type};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn parse_enum<E>(row: &Row, idx: usize) -> rusqlite::Result<E>
where
    E: FromStr,
    E::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub const USER_COLS: &str = "id, email, name, created_at, updated_at";

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

pub const API_KEY_COLS: &str = "id, user_id, prefix, key_hash, created_at, last_used_at";

impl FromRow for ApiKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ApiKey {
            id: row.get(0)?,
            user_id: row.get(1)?,
            prefix: row.get(2)?,
            key_hash: row.get(3)?,
            created_at: row.get(4)?,
            last_used_at: row.get(5)?,
        })
    }
}

pub const PROFILE_COLS: &str = "user_id, full_name, bio, location, avatar_url, resume_url, github_url, linkedin_url, updated_at";

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            user_id: row.get(0)?,
            full_name: row.get(1)?,
            bio: row.get(2)?,
            location: row.get(3)?,
            avatar_url: row.get(4)?,
            resume_url: row.get(5)?,
            github_url: row.get(6)?,
            linkedin_url: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

pub const SKILL_COLS: &str = "id, user_id, name, proficiency, created_at";

impl FromRow for Skill {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Skill {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            proficiency: parse_enum(row, 3)?,
            created_at: row.get(4)?,
        })
    }
}

pub const PROJECT_COLS: &str = "id, owner_id, name, description, status, visibility, team_size, tech_stack, required_skills, created_at, updated_at";

impl FromRow for Project {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Project {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: parse_enum(row, 4)?,
            visibility: parse_enum(row, 5)?,
            team_size: row.get(6)?,
            tech_stack: parse_json_list(row, 7)?,
            required_skills: parse_json_list(row, 8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

pub const TEAM_MEMBER_COLS: &str =
    "id, project_id, user_id, role, status, message, joined_at, created_at, updated_at";

impl FromRow for TeamMember {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TeamMember {
            id: row.get(0)?,
            project_id: row.get(1)?,
            user_id: row.get(2)?,
            role: parse_enum(row, 3)?,
            status: parse_enum(row, 4)?,
            message: row.get(5)?,
            joined_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Team member columns prefixed with `tm.`, followed by `u.name, u.email`.
pub const TEAM_MEMBER_WITH_USER_COLS: &str = "tm.id, tm.project_id, tm.user_id, tm.role, tm.status, tm.message, tm.joined_at, tm.created_at, tm.updated_at, u.name, u.email";

impl FromRow for TeamMemberWithUser {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TeamMemberWithUser {
            member: TeamMember::from_row(row)?,
            name: row.get(9)?,
            email: row.get(10)?,
        })
    }
}

pub const TASK_COLS: &str = "id, project_id, title, description, status, priority, assignee_id, created_by, due_date, created_at, updated_at";

impl FromRow for Task {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Task {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: parse_enum(row, 4)?,
            priority: parse_enum(row, 5)?,
            assignee_id: row.get(6)?,
            created_by: row.get(7)?,
            due_date: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

pub const NOTIFICATION_COLS: &str =
    "id, user_id, kind, title, message, project_id, read, created_at";

impl FromRow for Notification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: parse_enum(row, 2)?,
            title: row.get(3)?,
            message: row.get(4)?,
            project_id: row.get(5)?,
            read: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
        })
    }
}
