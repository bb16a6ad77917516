//! Authentication route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::extract::JsonBody;
use crate::middleware::{RequireAuth, auth_rate_limiter, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthError, AuthService};
use crate::services::cart::{CartService, GuestCart, MergeReport, SyncLine};
use crate::state::AppState;

/// Register and login are rate limited per client IP.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter(state.config()))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Registration form data.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

/// Create an account.
///
/// POST /api/auth/register
///
/// # Errors
///
/// Returns 400 with field details for an invalid name, email or password,
/// or when the email is already registered.
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = AuthService::new(state.pool())
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            user,
        }),
    ))
}

/// Login form data.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: User,
    /// Outcome of merging the guest cart, absent when there was nothing to
    /// merge or the merge failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<MergeReport>,
}

/// Sign in and fold the guest cart into the account.
///
/// POST /api/auth/login
///
/// A failed merge does not fail the login: the guest cart stays in the
/// session and can be synced again.
///
/// # Errors
///
/// Returns 401 for unknown email or wrong password.
#[instrument(skip(state, session, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<Json<LoginResponse>> {
    let user = AuthService::new(state.pool())
        .login(&payload.email, &payload.password)
        .await?;

    session.cycle_id().await?;
    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "User logged in", None);

    let cart = merge_guest_cart(&state, &session, &user).await;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        success: true,
        user,
        cart,
    }))
}

async fn merge_guest_cart(state: &AppState, session: &Session, user: &User) -> Option<MergeReport> {
    let guest = GuestCart::new(state.pool(), session);
    let lines: Vec<SyncLine> = match guest.state().await {
        Ok(cart) if cart.is_empty() => return None,
        Ok(cart) => cart.entries().iter().map(SyncLine::from).collect(),
        Err(e) => {
            warn!(error = %e, "Could not read guest cart");
            return None;
        }
    };

    let report = CartService::new(state.pool(), state.cart_locks())
        .merge_guest_cart(user.id, &lines)
        .await;
    match report {
        Ok(report) => {
            if let Err(e) = guest.discard().await {
                warn!(error = %e, "Could not discard merged guest cart");
            }
            Some(report)
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Guest cart merge failed; keeping guest cart");
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Sign out, discarding the whole session including any guest state.
///
/// POST /api/auth/logout
///
/// # Errors
///
/// Returns an error if the session store fails.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<LogoutResponse>> {
    session.flush().await?;
    clear_sentry_user();
    add_breadcrumb("auth", "User logged out", None);

    Ok(Json(LogoutResponse { success: true }))
}

/// The signed-in user.
///
/// GET /api/auth/me
///
/// # Errors
///
/// Returns 401 without a session user or if the account no longer exists.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .get_user(current.id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::Unauthorized("Authentication required".into()),
            other => AppError::Auth(other),
        })?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}
