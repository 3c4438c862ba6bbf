pub mod model;
pub mod service;

pub use model::{Comment, Issue, IssueChanges, IssueStatus, IssueView, Priority};
pub use service::{CreateIssue, IssueService};
