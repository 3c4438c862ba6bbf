pub mod bootstrap;
pub mod memory;
pub mod postgres;
pub mod valkey;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::credentials::CredentialService;
use crate::auth::token::TokenSigner;
use crate::auth::user::{NewUser, User};
use crate::config::Config;
use crate::error::ApiError;
use crate::issues::model::{Comment, Issue, IssueChanges, NewIssue};
use crate::issues::service::IssueService;
use crate::rbac::Role;

/// Issue documents with their embedded comments.
///
/// Every method is a single atomic read or read-modify-write on one document
/// (or a plain scan). Methods that target an id return `Ok(None)` when the
/// issue does not exist.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn insert_issue(&self, new: NewIssue) -> Result<Issue, ApiError>;

    /// All issues, newest first.
    async fn list_issues(&self) -> Result<Vec<Issue>, ApiError>;

    /// Issues reported by or assigned to `user_id`, newest first.
    async fn list_issues_involving(&self, user_id: Uuid) -> Result<Vec<Issue>, ApiError>;

    async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>, ApiError>;

    async fn update_issue(
        &self,
        id: Uuid,
        changes: &IssueChanges,
    ) -> Result<Option<Issue>, ApiError>;

    async fn set_assignee(&self, id: Uuid, assignee: Uuid) -> Result<Option<Issue>, ApiError>;

    /// Append a comment and return the full, updated comment sequence.
    async fn push_comment(
        &self,
        id: Uuid,
        comment: Comment,
    ) -> Result<Option<Vec<Comment>>, ApiError>;
}

/// User accounts. Email is unique; a duplicate insert yields `Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, new: NewUser) -> Result<User, ApiError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError>;

    /// Users holding `role`, ordered by name.
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ApiError>;

    async fn count_users(&self) -> Result<i64, ApiError>;
}

#[derive(Clone)]
pub struct AppState {
    pub issues: IssueService,
    pub credentials: CredentialService,
    /// Present when `VALKEY_URL` is configured; enables login rate limiting.
    pub valkey: Option<fred::clients::Pool>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        issue_store: Arc<dyn IssueStore>,
        user_store: Arc<dyn UserStore>,
        valkey: Option<fred::clients::Pool>,
        config: Config,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl_hours,
        ));
        Self {
            issues: IssueService::new(issue_store, Arc::clone(&user_store)),
            credentials: CredentialService::new(user_store, signer),
            valkey,
            config: Arc::new(config),
        }
    }
}
