use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::user::{NewUser, User};
use crate::error::ApiError;
use crate::issues::model::{Comment, Issue, IssueChanges, IssueStatus, NewIssue};
use crate::rbac::Role;
use crate::store::{IssueStore, UserStore};

/// In-process store. Each operation holds the map lock for its whole
/// read-modify-write, mirroring the per-document atomicity of `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    issues: RwLock<HashMap<Uuid, Issue>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut issues: Vec<Issue>) -> Vec<Issue> {
    issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    issues
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn insert_issue(&self, new: NewIssue) -> Result<Issue, ApiError> {
        let now = Utc::now();
        let issue = Issue {
            id: Uuid::now_v7(),
            title: new.title,
            description: new.description,
            status: IssueStatus::Open,
            priority: new.priority,
            reporter: new.reporter,
            assignee: None,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.issues.write().await.insert(issue.id, issue.clone());
        Ok(issue)
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, ApiError> {
        let issues = self.issues.read().await.values().cloned().collect();
        Ok(newest_first(issues))
    }

    async fn list_issues_involving(&self, user_id: Uuid) -> Result<Vec<Issue>, ApiError> {
        let issues = self
            .issues
            .read()
            .await
            .values()
            .filter(|i| i.involves(user_id))
            .cloned()
            .collect();
        Ok(newest_first(issues))
    }

    async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>, ApiError> {
        Ok(self.issues.read().await.get(&id).cloned())
    }

    async fn update_issue(
        &self,
        id: Uuid,
        changes: &IssueChanges,
    ) -> Result<Option<Issue>, ApiError> {
        let mut issues = self.issues.write().await;
        let Some(issue) = issues.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(issue);
        issue.updated_at = Utc::now();
        Ok(Some(issue.clone()))
    }

    async fn set_assignee(&self, id: Uuid, assignee: Uuid) -> Result<Option<Issue>, ApiError> {
        let mut issues = self.issues.write().await;
        let Some(issue) = issues.get_mut(&id) else {
            return Ok(None);
        };
        issue.assignee = Some(assignee);
        issue.updated_at = Utc::now();
        Ok(Some(issue.clone()))
    }

    async fn push_comment(
        &self,
        id: Uuid,
        comment: Comment,
    ) -> Result<Option<Vec<Comment>>, ApiError> {
        let mut issues = self.issues.write().await;
        let Some(issue) = issues.get_mut(&id) else {
            return Ok(None);
        };
        issue.comments.push(comment);
        issue.updated_at = Utc::now();
        Ok(Some(issue.comments.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(ApiError::Conflict("email already registered".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ApiError> {
        let mut matching: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn count_users(&self) -> Result<i64, ApiError> {
        let count = self.users.read().await.len();
        i64::try_from(count).map_err(|e| ApiError::Internal(e.into()))
    }
}
