use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn can_manage_members(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Active,
    Inactive,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub message: Option<String>,
    pub joined_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TeamMember {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// Active owner or admin.
    pub fn can_manage(&self) -> bool {
        self.is_active() && self.role.can_manage_members()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberWithUser {
    #[serde(flatten)]
    pub member: TeamMember,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamMember {
    pub role: Option<MemberRole>,
    pub status: Option<MemberStatus>,
}
