pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod issues;
pub mod rbac;
pub mod store;
pub mod validation;
