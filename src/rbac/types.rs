use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. Stored in the `role` column of `users` and carried inside
/// session tokens; the wire/storage spelling is the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    User,
    Developer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Developer => "Developer",
            Self::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Developer" => Ok(Self::Developer),
            "Admin" => Ok(Self::Admin),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// Operations gated by the policy table in [`crate::rbac::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateIssue,
    ListAllIssues,
    ListOwnIssues,
    ReadIssue,
    UpdateIssueFields,
    UpdateIssueStatus,
    AssignIssue,
    AddComment,
    ListDevelopers,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateIssue => "issue:create",
            Self::ListAllIssues => "issue:list_all",
            Self::ListOwnIssues => "issue:list_own",
            Self::ReadIssue => "issue:read",
            Self::UpdateIssueFields => "issue:update_fields",
            Self::UpdateIssueStatus => "issue:update_status",
            Self::AssignIssue => "issue:assign",
            Self::AddComment => "comment:create",
            Self::ListDevelopers => "user:list_developers",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}
