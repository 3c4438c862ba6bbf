use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;
use crate::rbac::{Actor, Role};
use crate::store::AppState;

/// Authenticated user extracted from the `Authorization: Bearer` header.
/// Handlers that take this extractor reject unauthenticated requests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub user_name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            name: self.user_name.clone(),
            role: self.role,
        }
    }
}

impl From<Actor> for AuthUser {
    fn from(actor: Actor) -> Self {
        Self {
            user_id: actor.id,
            user_name: actor.name,
            role: actor.role,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw_token = extract_bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let actor = state.credentials.authenticate(&raw_token)?;
        Ok(actor.into())
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}
