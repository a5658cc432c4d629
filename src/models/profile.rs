use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub resume_url: Option<String>,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub updated_at: i64,
}

/// Partial profile update.
/// None = leave unchanged, Some(None) = clear, Some(Some(v)) = set
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    #[serde(default, deserialize_with = "super::nullable")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub github_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub linkedin_url: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct ProfileWithSkills {
    #[serde(flatten)]
    pub profile: Profile,
    pub name: String,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub proficiency: Proficiency,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSkill {
    pub name: String,
    pub proficiency: Proficiency,
}

impl CreateSkill {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Skill name is required".into()));
        }
        Ok(())
    }
}

/// Resume upload body. The file travels base64-encoded inside JSON.
#[derive(Debug, Deserialize)]
pub struct UploadResume {
    pub file_name: String,
    pub content_type: String,
    pub data_base64: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeUploaded {
    pub resume_url: String,
    pub size: usize,
}
