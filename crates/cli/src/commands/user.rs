//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first administrator
//! marigold-cli user create -e admin@example.com -n "Admin Name" -p 'long-password' -r admin
//! ```
//!
//! Password, email and name rules are the same as for self-registration.

use thiserror::Error;

use marigold_core::{Role, UserId};
use marigold_storefront::services::auth::{AuthError, AuthService};

use super::MissingDatabaseUrl;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: user, admin, editor, moderator")]
    InvalidRole(String),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Create a user with the given role.
///
/// # Errors
///
/// Returns an error if the role or any field is invalid, the email is taken,
/// or the database is unreachable.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, UserError> {
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let database_url = super::database_url()?;
    let pool = super::connect(&database_url).await?;

    tracing::info!("Creating user: {} ({})", email, role);

    let user = AuthService::new(&pool)
        .create_user(name, email, password, role)
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => UserError::UserExists(email.to_owned()),
            other => UserError::Auth(other),
        })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}
