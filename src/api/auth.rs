use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::helpers::{JsonBody, parse_field};
use crate::auth::credentials::Signup;
use crate::auth::middleware::AuthUser;
use crate::auth::rate_limit;
use crate::auth::user::UserResponse;
use crate::error::ApiError;
use crate::store::AppState;

const LOGIN_MAX_ATTEMPTS: u64 = 10;
const LOGIN_WINDOW_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/developers", get(developers))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, body), err)]
async fn signup(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let req = Signup {
        name: body.name,
        email: body.email,
        password: body.password,
        role: parse_field("role", body.role.as_deref())?,
    };

    let user = state.credentials.signup(req).await?;
    Ok((StatusCode::CREATED, Json(SignupResponse { user })))
}

#[tracing::instrument(skip(state, body), err)]
async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::BadRequest("email and password are required".into()));
    };

    rate_limit::check_rate(
        state.valkey.as_ref(),
        "login",
        &email,
        LOGIN_MAX_ATTEMPTS,
        LOGIN_WINDOW_SECS,
    )
    .await?;

    let session = state.credentials.login(&email, &password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: session.user,
    }))
}

async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.credentials.me(&auth.actor()).await?;
    Ok(Json(user))
}

async fn developers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.credentials.developers(&auth.actor()).await?;
    Ok(Json(users))
}
