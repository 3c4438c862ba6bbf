use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::helpers::{JsonBody, PathParam, parse_field};
use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::issues::{Comment, CreateIssue, Issue, IssueChanges, IssueView};
use crate::rbac::Action;
use crate::rbac::policy;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Enum- and id-valued fields arrive as strings so that unknown values
/// surface as 400 with a readable message.
#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignIssueRequest {
    pub assignee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub message: &'static str,
    pub issue: Issue,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/issues", get(list_issues).post(create_issue))
        .route("/api/issues/{id}", get(get_issue).put(update_issue))
        .route("/api/issues/{id}/assign", put(assign_issue))
        .route("/api/issues/{id}/comment", post(add_comment))
}

// ---------------------------------------------------------------------------
// Issue handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.user_id), err)]
async fn create_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<CreateIssueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let req = CreateIssue {
        title: body.title,
        description: body.description,
        priority: parse_field("priority", body.priority.as_deref())?,
    };

    let issue = state.issues.create(&auth.actor(), req).await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

async fn list_issues(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<IssueView>>, ApiError> {
    let issues = state.issues.list(&auth.actor()).await?;
    Ok(Json(issues))
}

async fn get_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Issue>, ApiError> {
    let issue = state.issues.get(id, &auth.actor()).await?;
    Ok(Json(issue))
}

#[tracing::instrument(skip(state, auth, body), fields(%id, user_id = %auth.user_id), err)]
async fn update_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<UpdateIssueRequest>,
) -> Result<Json<Issue>, ApiError> {
    let changes = IssueChanges {
        title: body.title,
        description: body.description,
        priority: parse_field("priority", body.priority.as_deref())?,
        status: parse_field("status", body.status.as_deref())?,
    };

    let issue = state.issues.update(id, &auth.actor(), changes).await?;
    Ok(Json(issue))
}

#[tracing::instrument(skip(state, auth, body), fields(%id, user_id = %auth.user_id), err)]
async fn assign_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<AssignIssueRequest>,
) -> Result<Json<AssignResponse>, ApiError> {
    let actor = auth.actor();
    // Non-admins get 403 before assigneeId is parsed
    policy::authorize(&actor, Action::AssignIssue)?;
    let assignee: Uuid = parse_field("assigneeId", body.assignee_id.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("assigneeId is required".into()))?;

    let issue = state.issues.assign(id, &actor, assignee).await?;
    Ok(Json(AssignResponse {
        message: "Issue assigned successfully",
        issue,
    }))
}

// ---------------------------------------------------------------------------
// Comment handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, auth, body), fields(%id, user_id = %auth.user_id), err)]
async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<AddCommentRequest>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state
        .issues
        .add_comment(id, &auth.actor(), body.text.as_deref())
        .await?;
    Ok(Json(comments))
}
