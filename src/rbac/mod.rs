pub mod policy;
pub mod types;

pub use types::{Action, Actor, Role};
