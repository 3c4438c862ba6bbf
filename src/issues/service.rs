use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::issues::model::{
    Comment, Issue, IssueChanges, IssueView, NewIssue, Priority, UserSummary,
};
use crate::rbac::policy::{self, ListScope};
use crate::rbac::{Action, Actor};
use crate::store::{IssueStore, UserStore};
use crate::validation::{self, MAX_TEXT_LEN, MAX_TITLE_LEN};

/// Fields accepted when filing an issue. Missing values are rejected by
/// [`IssueService::create`], not by deserialization.
#[derive(Debug, Clone, Default)]
pub struct CreateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
}

/// Issue operations. Every call is checked against the role policy before
/// the store is mutated.
#[derive(Clone)]
pub struct IssueService {
    issues: Arc<dyn IssueStore>,
    users: Arc<dyn UserStore>,
}

impl IssueService {
    pub fn new(issues: Arc<dyn IssueStore>, users: Arc<dyn UserStore>) -> Self {
        Self { issues, users }
    }

    #[tracing::instrument(skip(self, actor, req), fields(user_id = %actor.id, role = %actor.role), err)]
    pub async fn create(&self, actor: &Actor, req: CreateIssue) -> Result<Issue, ApiError> {
        policy::authorize(actor, Action::CreateIssue)?;

        let title = validation::check_required("title", req.title.as_deref(), MAX_TITLE_LEN)?;
        let description =
            validation::check_required("description", req.description.as_deref(), MAX_TEXT_LEN)?;

        let issue = self
            .issues
            .insert_issue(NewIssue {
                title: title.to_owned(),
                description: description.to_owned(),
                priority: req.priority.unwrap_or_default(),
                reporter: actor.id,
            })
            .await?;

        tracing::info!(issue_id = %issue.id, priority = %issue.priority, "issue created");
        Ok(issue)
    }

    /// All issues for User/Admin; own reported or assigned issues for
    /// Developers, with the reporter's identity resolved.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id, role = %actor.role), err)]
    pub async fn list(&self, actor: &Actor) -> Result<Vec<IssueView>, ApiError> {
        match policy::list_scope(actor.role) {
            ListScope::All => {
                policy::authorize(actor, Action::ListAllIssues)?;
                let issues = self.issues.list_issues().await?;
                Ok(issues
                    .into_iter()
                    .map(|issue| IssueView {
                        issue,
                        reporter_details: None,
                    })
                    .collect())
            }
            ListScope::Own => {
                policy::authorize(actor, Action::ListOwnIssues)?;
                let issues = self.issues.list_issues_involving(actor.id).await?;
                self.with_reporters(issues).await
            }
        }
    }

    async fn with_reporters(&self, issues: Vec<Issue>) -> Result<Vec<IssueView>, ApiError> {
        let mut reporter_ids: Vec<Uuid> = issues.iter().map(|i| i.reporter).collect();
        reporter_ids.sort_unstable();
        reporter_ids.dedup();

        let reporters: HashMap<Uuid, UserSummary> = self
            .users
            .find_users(&reporter_ids)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect();

        Ok(issues
            .into_iter()
            .map(|issue| {
                let reporter_details = reporters.get(&issue.reporter).cloned();
                IssueView {
                    issue,
                    reporter_details,
                }
            })
            .collect())
    }

    /// Developers only see issues they reported or are assigned to; anything
    /// else reads as absent.
    #[tracing::instrument(skip(self, actor), fields(%id, user_id = %actor.id), err)]
    pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<Issue, ApiError> {
        policy::authorize(actor, Action::ReadIssue)?;

        self.find_visible(id, actor).await
    }

    /// Apply the supplied subset of title/description/priority/status.
    /// Omitted fields keep their stored values.
    #[tracing::instrument(skip(self, actor, changes), fields(%id, user_id = %actor.id, role = %actor.role), err)]
    pub async fn update(
        &self,
        id: Uuid,
        actor: &Actor,
        changes: IssueChanges,
    ) -> Result<Issue, ApiError> {
        validation::check_optional("title", changes.title.as_deref(), MAX_TITLE_LEN)?;
        validation::check_optional("description", changes.description.as_deref(), MAX_TEXT_LEN)?;

        let current = self.find_visible(id, actor).await?;

        policy::authorize(actor, Action::UpdateIssueFields)?;
        if changes.status.is_some() {
            policy::authorize(actor, Action::UpdateIssueStatus)?;
        }

        if changes.is_empty() {
            return Ok(current);
        }

        let issue = self
            .issues
            .update_issue(id, &changes)
            .await?
            .ok_or_else(|| ApiError::NotFound("issue".into()))?;

        if let Some(status) = changes.status
            && status != current.status
        {
            tracing::info!(from = %current.status, to = %status, "issue status changed");
        }
        Ok(issue)
    }

    /// Admin-only. The assignee id is stored as given; it is not checked
    /// against the user store or required to be a Developer.
    #[tracing::instrument(skip(self, actor), fields(%id, %assignee, user_id = %actor.id), err)]
    pub async fn assign(&self, id: Uuid, actor: &Actor, assignee: Uuid) -> Result<Issue, ApiError> {
        policy::authorize(actor, Action::AssignIssue)?;

        let issue = self
            .issues
            .set_assignee(id, assignee)
            .await?
            .ok_or_else(|| ApiError::NotFound("issue".into()))?;

        tracing::info!("issue assigned");
        Ok(issue)
    }

    /// Append a comment and return the issue's full comment sequence.
    #[tracing::instrument(skip(self, actor, text), fields(%id, user_id = %actor.id), err)]
    pub async fn add_comment(
        &self,
        id: Uuid,
        actor: &Actor,
        text: Option<&str>,
    ) -> Result<Vec<Comment>, ApiError> {
        policy::authorize(actor, Action::AddComment)?;
        let text = validation::check_required("text", text, MAX_TEXT_LEN)?;
        self.find_visible(id, actor).await?;

        let comments = self
            .issues
            .push_comment(
                id,
                Comment {
                    author: actor.id,
                    text: text.to_owned(),
                    created_at: Utc::now(),
                },
            )
            .await?
            .ok_or_else(|| ApiError::NotFound("issue".into()))?;

        tracing::info!(count = comments.len(), "comment added");
        Ok(comments)
    }

    /// Load an issue the actor may see. Issues outside a Developer's own
    /// scope read as absent.
    async fn find_visible(&self, id: Uuid, actor: &Actor) -> Result<Issue, ApiError> {
        let issue = self
            .issues
            .get_issue(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("issue".into()))?;

        if policy::list_scope(actor.role) == ListScope::Own && !issue.involves(actor.id) {
            return Err(ApiError::NotFound("issue".into()));
        }
        Ok(issue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::NewUser;
    use crate::issues::model::IssueStatus;
    use crate::rbac::Role;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        service: IssueService,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = IssueService::new(store.clone(), store.clone());
        Fixture { service, store }
    }

    async fn register(store: &MemoryStore, name: &str, role: Role) -> Actor {
        let user = store
            .insert_user(NewUser {
                name: name.into(),
                email: format!("{name}@test.com"),
                password_hash: "$argon2id$placeholder".into(),
                role,
            })
            .await
            .unwrap();
        Actor {
            id: user.id,
            name: user.name,
            role,
        }
    }

    fn bug_a() -> CreateIssue {
        CreateIssue {
            title: Some("Bug A".into()),
            description: Some("desc".into()),
            priority: Some(Priority::High),
        }
    }

    #[tokio::test]
    async fn create_as_user_sets_reporter_and_defaults() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;

        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        assert_eq!(issue.status, IssueStatus::Open);
        assert_eq!(issue.reporter, u1.id);
        assert_eq!(issue.priority, Priority::High);
        assert!(issue.assignee.is_none());
    }

    #[tokio::test]
    async fn create_defaults_priority_to_medium() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let req = CreateIssue {
            priority: None,
            ..bug_a()
        };

        let issue = f.service.create(&u1, req).await.unwrap();
        assert_eq!(issue.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn create_requires_title_and_description() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;

        let no_title = CreateIssue {
            title: None,
            ..bug_a()
        };
        let blank_description = CreateIssue {
            description: Some("  ".into()),
            ..bug_a()
        };

        for req in [no_title, blank_description] {
            let err = f.service.create(&u1, req).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
        assert!(f.store.list_issues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn developer_cannot_create() {
        let f = fixture();
        let dev = register(&f.store, "dev", Role::Developer).await;

        let err = f.service.create(&dev, bug_a()).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(f.store.list_issues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn developer_list_is_scoped_and_resolves_reporter() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let admin = register(&f.store, "admin", Role::Admin).await;
        let d1 = register(&f.store, "d1", Role::Developer).await;
        let d2 = register(&f.store, "d2", Role::Developer).await;

        let x = f.service.create(&u1, bug_a()).await.unwrap();
        let y = f.service.create(&u1, bug_a()).await.unwrap();
        f.service.assign(x.id, &admin, d2.id).await.unwrap();

        let d1_view = f.service.list(&d1).await.unwrap();
        assert!(d1_view.is_empty());

        let d2_view = f.service.list(&d2).await.unwrap();
        assert_eq!(d2_view.len(), 1);
        assert_eq!(d2_view[0].issue.id, x.id);
        let reporter = d2_view[0].reporter_details.as_ref().unwrap();
        assert_eq!(reporter.id, u1.id);
        assert_eq!(reporter.email, "u1@test.com");

        let user_view = f.service.list(&u1).await.unwrap();
        let ids: Vec<Uuid> = user_view.iter().map(|v| v.issue.id).collect();
        assert!(ids.contains(&x.id) && ids.contains(&y.id));
        assert!(user_view.iter().all(|v| v.reporter_details.is_none()));
    }

    #[tokio::test]
    async fn update_preserves_omitted_fields() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        let changes = IssueChanges {
            priority: Some(Priority::Low),
            ..IssueChanges::default()
        };
        f.service.update(issue.id, &u1, changes).await.unwrap();

        let stored = f.service.get(issue.id, &u1).await.unwrap();
        assert_eq!(stored.priority, Priority::Low);
        assert_eq!(stored.title, issue.title);
        assert_eq!(stored.description, issue.description);
        assert_eq!(stored.status, issue.status);
        assert_eq!(stored.reporter, u1.id);
    }

    #[tokio::test]
    async fn user_cannot_change_status() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        let changes = IssueChanges {
            status: Some(IssueStatus::Closed),
            title: Some("sneaky".into()),
            ..IssueChanges::default()
        };
        let err = f.service.update(issue.id, &u1, changes).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let stored = f.store.get_issue(issue.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IssueStatus::Open);
        assert_eq!(stored.title, "Bug A");
    }

    #[tokio::test]
    async fn developer_moves_issue_through_statuses() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let dev = register(&f.store, "dev", Role::Developer).await;
        let admin = register(&f.store, "admin", Role::Admin).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();
        f.service.assign(issue.id, &admin, dev.id).await.unwrap();

        for status in [IssueStatus::InProgress, IssueStatus::Closed, IssueStatus::Open] {
            let changes = IssueChanges {
                status: Some(status),
                ..IssueChanges::default()
            };
            let updated = f.service.update(issue.id, &dev, changes).await.unwrap();
            assert_eq!(updated.status, status);
            assert_eq!(updated.reporter, u1.id);
        }
    }

    #[tokio::test]
    async fn update_missing_issue_is_not_found() {
        let f = fixture();
        let admin = register(&f.store, "admin", Role::Admin).await;
        let err = f
            .service
            .update(Uuid::new_v4(), &admin, IssueChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn non_admin_assign_leaves_assignee_unchanged() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let dev = register(&f.store, "dev", Role::Developer).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        for actor in [&u1, &dev] {
            let err = f.service.assign(issue.id, actor, dev.id).await.unwrap_err();
            assert!(matches!(err, ApiError::Forbidden(_)));
        }

        let stored = f.store.get_issue(issue.id).await.unwrap().unwrap();
        assert!(stored.assignee.is_none());
    }

    #[tokio::test]
    async fn assign_does_not_validate_assignee() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let admin = register(&f.store, "admin", Role::Admin).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        // A plain User and an id with no account are both accepted.
        let updated = f.service.assign(issue.id, &admin, u1.id).await.unwrap();
        assert_eq!(updated.assignee, Some(u1.id));
        let ghost = Uuid::new_v4();
        let updated = f.service.assign(issue.id, &admin, ghost).await.unwrap();
        assert_eq!(updated.assignee, Some(ghost));
    }

    #[tokio::test]
    async fn assign_forbidden_checked_before_existence() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let err = f
            .service
            .assign(Uuid::new_v4(), &u1, u1.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn comments_append_one_at_a_time() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let dev = register(&f.store, "dev", Role::Developer).await;
        let admin = register(&f.store, "admin", Role::Admin).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();
        f.service.assign(issue.id, &admin, dev.id).await.unwrap();

        let first = f
            .service
            .add_comment(issue.id, &u1, Some("first"))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = f
            .service
            .add_comment(issue.id, &dev, Some("second"))
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], first[0]);
        assert_eq!(second[1].author, dev.id);
        assert_eq!(second[1].text, "second");
    }

    #[tokio::test]
    async fn empty_comment_rejected_before_lookup() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;

        let err = f
            .service
            .add_comment(Uuid::new_v4(), &u1, Some(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = f
            .service
            .add_comment(Uuid::new_v4(), &u1, Some("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn developer_get_hides_unrelated_issue() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let dev = register(&f.store, "dev", Role::Developer).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();

        let err = f.service.get(issue.id, &dev).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(f.service.get(issue.id, &u1).await.is_ok());
    }

    #[tokio::test]
    async fn developer_cannot_read_unrelated_issue_through_writes() {
        let f = fixture();
        let u1 = register(&f.store, "u1", Role::User).await;
        let dev = register(&f.store, "dev", Role::Developer).await;
        let issue = f.service.create(&u1, bug_a()).await.unwrap();
        f.service
            .add_comment(issue.id, &u1, Some("private"))
            .await
            .unwrap();

        let err = f
            .service
            .update(issue.id, &dev, IssueChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let status_change = IssueChanges {
            status: Some(IssueStatus::Closed),
            ..IssueChanges::default()
        };
        let err = f
            .service
            .update(issue.id, &dev, status_change)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = f
            .service
            .add_comment(issue.id, &dev, Some("peek"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let stored = f.store.get_issue(issue.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IssueStatus::Open);
        assert_eq!(stored.comments.len(), 1);
    }
}
