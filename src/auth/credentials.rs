use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::password;
use crate::auth::token::TokenSigner;
use crate::auth::user::{NewUser, UserResponse};
use crate::error::ApiError;
use crate::rbac::policy;
use crate::rbac::{Action, Actor, Role};
use crate::store::UserStore;
use crate::validation;

#[derive(Debug, Clone, Default)]
pub struct Signup {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Account registration, password login and session-token verification.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    signer: Arc<TokenSigner>,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserStore>, signer: Arc<TokenSigner>) -> Self {
        Self { users, signer }
    }

    #[tracing::instrument(skip(self, req), fields(role = ?req.role), err)]
    pub async fn signup(&self, req: Signup) -> Result<UserResponse, ApiError> {
        let name = validation::check_required("name", req.name.as_deref(), 255)?;
        let email = validation::check_required("email", req.email.as_deref(), 254)?.trim();
        validation::check_email(email)?;
        let plain = req.password.as_deref().unwrap_or_default();
        validation::check_password(plain)?;

        let password_hash = password::hash_password(plain).map_err(ApiError::Internal)?;

        let user = self
            .users
            .insert_user(NewUser {
                name: name.trim().to_owned(),
                email: email.to_owned(),
                password_hash,
                role: req.role.unwrap_or_default(),
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user.into())
    }

    #[tracing::instrument(skip(self, email, plain), err)]
    pub async fn login(&self, email: &str, plain: &str) -> Result<Session, ApiError> {
        let user = self.users.find_user_by_email(email.trim()).await?;

        // Always run argon2 verify, even when the account does not exist
        let (hash_to_verify, user) = match user {
            Some(u) => (u.password_hash.clone(), Some(u)),
            None => (password::dummy_hash().to_owned(), None),
        };

        let password_valid =
            password::verify_password(plain, &hash_to_verify).map_err(ApiError::Internal)?;

        let user = match user {
            Some(u) if password_valid => u,
            _ => return Err(ApiError::Unauthorized),
        };

        let actor = Actor {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
        };
        let (token, expires_at) = self.signer.issue(&actor).map_err(ApiError::Internal)?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(Session {
            token,
            expires_at,
            user: user.into(),
        })
    }

    /// Resolve a bearer token to the acting user.
    pub fn authenticate(&self, token: &str) -> Result<Actor, ApiError> {
        self.signer
            .verify(token)
            .map(Actor::from)
            .ok_or(ApiError::Unauthorized)
    }

    pub async fn me(&self, actor: &Actor) -> Result<UserResponse, ApiError> {
        self.users
            .find_user(actor.id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| ApiError::NotFound("user".into()))
    }

    /// All Developer accounts, for the assignment picker.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id), err)]
    pub async fn developers(&self, actor: &Actor) -> Result<Vec<UserResponse>, ApiError> {
        policy::authorize(actor, Action::ListDevelopers)?;
        let users = self.users.list_users_by_role(Role::Developer).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Whether any account exists yet. Used by first-run bootstrap.
    pub async fn has_users(&self) -> Result<bool, ApiError> {
        Ok(self.users.count_users().await? > 0)
    }
}
