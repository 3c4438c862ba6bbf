use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use crate::auth::user::{NewUser, User};
use crate::error::ApiError;
use crate::issues::model::{Comment, Issue, IssueChanges, IssueStatus, NewIssue, Priority};
use crate::rbac::Role;
use crate::store::{IssueStore, UserStore};

const ISSUE_COLUMNS: &str = "id, title, description, status, priority, reporter_id, assignee_id, \
                             comments, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// PostgreSQL-backed store. Comments live in a JSONB array on the issue row,
/// so every issue mutation is a single-row statement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations.
    #[tracing::instrument(skip(url), err)]
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        tracing::info!("connected to postgres");

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("migrations applied");

        Ok(Self::new(pool))
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: Uuid,
    title: String,
    description: String,
    status: String,
    priority: String,
    reporter_id: Uuid,
    assignee_id: Option<Uuid>,
    comments: Json<Vec<Comment>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IssueRow> for Issue {
    type Error = ApiError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status.parse()?,
            priority: row.priority.parse()?,
            reporter: row.reporter_id,
            assignee: row.assignee_id,
            comments: row.comments.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_issues(rows: Vec<IssueRow>) -> Result<Vec<Issue>, ApiError> {
    rows.into_iter().map(Issue::try_from).collect()
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>, ApiError> {
    rows.into_iter().map(User::try_from).collect()
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[async_trait]
impl IssueStore for PgStore {
    async fn insert_issue(&self, new: NewIssue) -> Result<Issue, ApiError> {
        let row: IssueRow = sqlx::query_as(&format!(
            "INSERT INTO issues (id, title, description, priority, reporter_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.priority.as_str())
        .bind(new.reporter)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, ApiError> {
        let rows: Vec<IssueRow> = sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_issues(rows)
    }

    async fn list_issues_involving(&self, user_id: Uuid) -> Result<Vec<Issue>, ApiError> {
        let rows: Vec<IssueRow> = sqlx::query_as(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues
             WHERE reporter_id = $1 OR assignee_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_issues(rows)
    }

    async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>, ApiError> {
        let row: Option<IssueRow> =
            sqlx::query_as(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn update_issue(
        &self,
        id: Uuid,
        changes: &IssueChanges,
    ) -> Result<Option<Issue>, ApiError> {
        let row: Option<IssueRow> = sqlx::query_as(&format!(
            "UPDATE issues SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 priority = COALESCE($4, priority),
                 status = COALESCE($5, status),
                 updated_at = now()
             WHERE id = $1
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.priority.map(Priority::as_str))
        .bind(changes.status.map(IssueStatus::as_str))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn set_assignee(&self, id: Uuid, assignee: Uuid) -> Result<Option<Issue>, ApiError> {
        let row: Option<IssueRow> = sqlx::query_as(&format!(
            "UPDATE issues SET assignee_id = $2, updated_at = now()
             WHERE id = $1
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(id)
        .bind(assignee)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn push_comment(
        &self,
        id: Uuid,
        comment: Comment,
    ) -> Result<Option<Vec<Comment>>, ApiError> {
        // jsonb || jsonb-array appends the element atomically within the row update
        let comments: Option<Json<Vec<Comment>>> = sqlx::query_scalar(
            "UPDATE issues SET comments = comments || $2::jsonb, updated_at = now()
             WHERE id = $1
             RETURNING comments",
        )
        .bind(id)
        .bind(Json(vec![comment]))
        .fetch_optional(&self.pool)
        .await?;

        Ok(comments.map(|c| c.0))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new: NewUser) -> Result<User, ApiError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("email already registered".into()),
            other => other,
        })?;

        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        into_users(rows)
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ApiError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY name, id"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        into_users(rows)
    }

    async fn count_users(&self) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
