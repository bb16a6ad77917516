//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every error is rendered as `{"error": "...", "details": {...}}`, where
//! `details` maps a request field to what was wrong with it and is omitted
//! when empty.

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::gateway::GatewayError;
use crate::services::storage::StorageError;
use crate::services::upload::UploadError;

/// Per-field validation messages, keyed by the request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a problem with `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// `Ok(value)` when nothing was recorded, otherwise these errors.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field was recorded.
    pub fn finish_with<T>(self, value: T) -> std::result::Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` carrying these details.
    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (k, v) in iter {
            errors.add(k, v);
        }
        errors
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// One or more request fields are invalid.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payment gateway or object storage failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error for a single field.
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut details = FieldErrors::new();
        details.add(field, message);
        Self::Validation(details)
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Validation(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
                | Self::Internal(_)
                | Self::Upstream(_)
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash(_))
        )
    }

    /// Client-facing message and optional field details.
    ///
    /// Internal details never leave the server.
    fn body(&self) -> (String, Option<FieldErrors>) {
        match self {
            Self::Database(RepositoryError::NotFound) => ("Not found".to_string(), None),
            Self::Database(RepositoryError::Conflict(field)) => (
                format!("{field} already exists"),
                Some([(field.as_str(), "already exists")].into_iter().collect()),
            ),
            Self::Database(_) | Self::Internal(_) => ("Internal server error".to_string(), None),
            Self::Upstream(_) => ("External service error".to_string(), None),
            Self::Validation(details) => ("Validation failed".to_string(), Some(details.clone())),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => ("Invalid credentials".to_string(), None),
                AuthError::UserNotFound => ("User not found".to_string(), None),
                AuthError::UserAlreadyExists => (
                    "An account with this email already exists".to_string(),
                    err.field_error().map(|detail| [detail].into_iter().collect()),
                ),
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => (
                    "Validation failed".to_string(),
                    err.field_error().map(|detail| [detail].into_iter().collect()),
                ),
                AuthError::Repository(_) | AuthError::PasswordHash(_) => {
                    ("Internal server error".to_string(), None)
                }
            },
            Self::NotFound(what) => (format!("{what} not found"), None),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => {
                (msg.clone(), None)
            }
            Self::RateLimited => ("Too many requests".to_string(), None),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let (error, details) = self.body();

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductNotFound(id) => Self::NotFound(format!("Product {id}")),
            CartError::LineNotFound(id) => Self::NotFound(format!("Cart item for product {id}")),
            CartError::InvalidQuantity(e) => Self::field("quantity", e.to_string()),
            CartError::Repository(e) => Self::Database(e),
            CartError::Session(e) => Self::from(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(details) => Self::Validation(details),
            CheckoutError::UnknownProduct(id) => {
                Self::field("items", format!("product {id} does not exist"))
            }
            CheckoutError::AmountMismatch { expected, .. } => Self::field(
                "amount",
                format!("amount does not match order total ({expected})"),
            ),
            CheckoutError::InvalidSignature => Self::BadRequest("Invalid payment signature".into()),
            CheckoutError::OrderNotFound => Self::NotFound("Order".into()),
            CheckoutError::GatewayOrderMismatch => {
                Self::field("orderId", "does not belong to this order")
            }
            CheckoutError::Gateway(e) => Self::from(e),
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::Upstream(format!("payment gateway: {err}"))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::Upstream(format!("object storage: {err}"))
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::MissingFile => Self::field("file", "no file uploaded"),
            UploadError::UnsupportedType(ext) => {
                Self::field("file", format!("unsupported file type: {ext}"))
            }
            UploadError::TooLarge { max_bytes } => Self::field(
                "file",
                format!("file exceeds {} MB", max_bytes / (1024 * 1024)),
            ),
            UploadError::InvalidImage(msg) => Self::field("file", msg),
            UploadError::Multipart(msg) => Self::BadRequest(msg),
            UploadError::Storage(e) => Self::from(e),
            UploadError::Processing(msg) => Self::Internal(msg),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_field_errors_display() {
        let errors: FieldErrors = [("price", "is required"), ("name", "is required")]
            .into_iter()
            .collect();
        assert_eq!(errors.to_string(), "name: is required; price: is required");
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product 12".to_string());
        assert_eq!(err.to_string(), "Not found: Product 12");
    }

    #[tokio::test]
    async fn test_status_codes() {
        assert_eq!(
            render(AppError::NotFound("x".into())).await.0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            render(AppError::Unauthorized("x".into())).await.0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            render(AppError::Forbidden("x".into())).await.0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            render(AppError::Upstream("x".into())).await.0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            render(AppError::RateLimited).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            render(AppError::Database(RepositoryError::NotFound)).await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_validation_envelope_has_details() {
        let mut details = FieldErrors::new();
        details.add("amount", "must be positive");
        details.add("currency", "must be a three-letter code");

        let (status, body) = render(AppError::Validation(details)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"]["amount"], "must be positive");
        assert_eq!(body["details"]["currency"], "must be a three-letter code");
    }

    #[tokio::test]
    async fn test_conflict_names_field() {
        let (status, body) =
            render(AppError::Database(RepositoryError::Conflict("slug".into()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["slug"], "already exists");
    }

    #[tokio::test]
    async fn test_cart_line_over_limit_is_a_quantity_error() {
        let err = CartError::InvalidQuantity(marigold_core::CartStateError::QuantityLimit {
            max: 999,
        });
        let (status, body) = render(AppError::from(err)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"]["quantity"], "a cart line cannot hold more than 999");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = render(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_field_errors_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.add("email", "required");
        errors.add("email", "invalid");
        assert_eq!(errors.get("email"), Some("required"));
        assert!(errors.finish().is_err());
        assert!(FieldErrors::new().finish().is_ok());
    }
}
