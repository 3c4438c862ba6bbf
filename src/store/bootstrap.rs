use crate::auth::credentials::{CredentialService, Signup};
use crate::rbac::Role;

pub const ADMIN_EMAIL: &str = "admin@localhost";

/// Seed an Admin account on first run. Skipped once any user exists, or when
/// no admin password is configured.
#[tracing::instrument(skip(credentials, admin_password), err)]
pub async fn run(
    credentials: &CredentialService,
    admin_password: Option<&str>,
) -> anyhow::Result<()> {
    if credentials.has_users().await? {
        tracing::info!("bootstrap skipped, users already exist");
        return Ok(());
    }

    let Some(password) = admin_password else {
        tracing::info!("no admin password configured, skipping admin bootstrap");
        return Ok(());
    };

    tracing::info!("first run detected, creating admin user");

    let admin = credentials
        .signup(Signup {
            name: Some("Administrator".into()),
            email: Some(ADMIN_EMAIL.into()),
            password: Some(password.into()),
            role: Some(Role::Admin),
        })
        .await?;

    tracing::info!(user_id = %admin.id, "admin user created");
    Ok(())
}
