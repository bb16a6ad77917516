//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from registration, login and account creation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] marigold_core::EmailError),

    /// Display name missing or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Email is already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Wrong password, unknown email, or an unreadable stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// The request field this error is about, with a client-facing message.
    ///
    /// `None` for errors that are not tied to one submitted field.
    #[must_use]
    pub fn field_error(&self) -> Option<(&'static str, String)> {
        match self {
            Self::InvalidEmail(e) => Some(("email", e.to_string())),
            Self::InvalidName(msg) => Some(("name", msg.clone())),
            Self::WeakPassword(msg) => Some(("password", msg.clone())),
            Self::UserAlreadyExists => Some(("email", "already exists".to_string())),
            Self::InvalidCredentials
            | Self::UserNotFound
            | Self::Repository(_)
            | Self::PasswordHash(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error() {
        assert_eq!(
            AuthError::WeakPassword("too short".into()).field_error(),
            Some(("password", "too short".to_string()))
        );
        assert_eq!(
            AuthError::UserAlreadyExists.field_error().map(|(f, _)| f),
            Some("email")
        );
        assert_eq!(AuthError::InvalidCredentials.field_error(), None);
    }
}
