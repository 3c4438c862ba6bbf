//! Role → action permission table.
//!
//! Every issue and comment operation consults this table before it touches
//! the store. The table is the single source of truth for who may do what.

use crate::error::ApiError;
use crate::rbac::types::{Action, Actor, Role};

const ANY_ROLE: &[Role] = &[Role::User, Role::Developer, Role::Admin];

/// Roles allowed to perform `action`.
pub fn allowed_roles(action: Action) -> &'static [Role] {
    match action {
        Action::CreateIssue | Action::ListAllIssues => &[Role::User, Role::Admin],
        Action::ListOwnIssues => &[Role::Developer],
        Action::UpdateIssueStatus => &[Role::Developer, Role::Admin],
        Action::AssignIssue => &[Role::Admin],
        Action::ReadIssue
        | Action::UpdateIssueFields
        | Action::AddComment
        | Action::ListDevelopers => ANY_ROLE,
    }
}

pub fn is_allowed(role: Role, action: Action) -> bool {
    allowed_roles(action).contains(&role)
}

/// Which slice of the issue collection a role sees when listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    /// Only issues the actor reported or is assigned to.
    Own,
}

pub fn list_scope(role: Role) -> ListScope {
    if is_allowed(role, Action::ListAllIssues) {
        ListScope::All
    } else {
        ListScope::Own
    }
}

/// Deny with `Forbidden` unless the actor's role may perform `action`.
pub fn authorize(actor: &Actor, action: Action) -> Result<(), ApiError> {
    if is_allowed(actor.role, action) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %actor.id,
        role = %actor.role,
        action = %action,
        "permission denied"
    );
    Err(ApiError::Forbidden(denial_message(action).into()))
}

fn denial_message(action: Action) -> &'static str {
    match action {
        Action::CreateIssue => "your role cannot create issues",
        Action::ListAllIssues | Action::ListOwnIssues => "your role cannot list issues",
        Action::UpdateIssueStatus => "only developers and admins can update status",
        Action::AssignIssue => "only admins can assign issues",
        Action::ReadIssue
        | Action::UpdateIssueFields
        | Action::AddComment
        | Action::ListDevelopers => "forbidden",
    }
}
