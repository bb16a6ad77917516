//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in user in route handlers, and
//! the role gate in front of `/api/admin`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;
use tracing::warn;

use marigold_core::Role;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// Rejects with `401` when there is no session user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await?))
    }
}

async fn current_user(parts: &Parts) -> Result<Option<CurrentUser>, AppError> {
    let Some(session) = parts.extensions.get::<Session>() else {
        return Ok(None);
    };
    Ok(session.get::<CurrentUser>(session_keys::CURRENT_USER).await?)
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Roles allowed through a [`require_role`] gate.
#[derive(Clone, Copy, Debug)]
pub struct AllowedRoles(pub &'static [Role]);

/// Gate a route group on the caller's role.
///
/// The role is re-read from the database so a demotion takes effect
/// immediately. Fails closed: no session user is `401`, a deleted user is
/// `401`, any other role is `403`.
///
/// # Example
///
/// ```rust,ignore
/// Router::new()
///     .route("/products", post(create))
///     .route_layer(from_fn_with_state(
///         (state.clone(), AllowedRoles(Role::CATALOG_MANAGERS)),
///         require_role,
///     ))
/// ```
///
/// # Errors
///
/// Returns `AppError::Unauthorized` or `AppError::Forbidden` as above.
pub async fn require_role(
    State((state, allowed)): State<(AppState, AllowedRoles)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let RequireAuth(user) = RequireAuth::from_request_parts(&mut parts, &()).await?;

    let role = UserRepository::new(state.pool())
        .get_role(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if !role.is_one_of(allowed.0) {
        warn!(user_id = %user.id, role = %role, path = %parts.uri.path(), "Role check failed");
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}
