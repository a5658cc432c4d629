use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub visibility: Visibility,
    pub team_size: i32,
    pub tech_stack: Vec<String>,
    pub required_skills: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default = "default_team_size")]
    pub team_size: i32,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
}

fn default_team_size() -> i32 {
    1
}

impl CreateProject {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Project name is required".into()));
        }
        if self.team_size < 1 {
            return Err(AppError::BadRequest("team_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub visibility: Option<Visibility>,
    pub team_size: Option<i32>,
    pub tech_stack: Option<Vec<String>>,
    pub required_skills: Option<Vec<String>>,
}

impl UpdateProject {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(AppError::BadRequest("Project name cannot be empty".into()));
        }
        if let Some(size) = self.team_size
            && size < 1
        {
            return Err(AppError::BadRequest("team_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// A public project suggested to a user, with the skills that matched.
#[derive(Debug, Serialize)]
pub struct ProjectRecommendation {
    #[serde(flatten)]
    pub project: Project,
    pub score: usize,
    pub matched_skills: Vec<String>,
}
