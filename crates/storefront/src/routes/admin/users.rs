//! Account management for admins.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use marigold_core::{Role, UserId};

use crate::db::UserRepository;
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::routes::products::{Page, Pagination};
use crate::services::auth::{AuthError, AuthService, validate_name};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

fn parse_role(value: &str) -> std::result::Result<Role, AppError> {
    value.parse::<Role>().map_err(|e| AppError::field("role", e))
}

/// Accounts, newest first.
///
/// GET /api/admin/users?page&limit
///
/// # Errors
///
/// Returns 400 for a page below 1.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<UserListResponse>> {
    let page = Page::from_params(params.page, params.limit).map_err(AppError::Validation)?;
    let (users, total) = UserRepository::new(state.pool())
        .list(page.size, page.offset())
        .await?;

    Ok(Json(UserListResponse {
        success: true,
        users,
        pagination: page.pagination(total),
    }))
}

/// `POST /api/admin/users` body.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

/// Create an account with a password and role (default `user`).
///
/// POST /api/admin/users
///
/// # Errors
///
/// Returns 400 for invalid fields, an unknown role or a taken email.
#[instrument(skip_all, fields(admin_id = %admin.id, email = %payload.email))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    JsonBody(payload): JsonBody<CreateUserPayload>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let role = payload
        .role
        .as_deref()
        .map(parse_role)
        .transpose()?
        .unwrap_or_default();

    let user = AuthService::new(state.pool())
        .create_user(&payload.name, &payload.email, &payload.password, role)
        .await?;

    info!(user_id = %user.id, role = %role, "User created by admin");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            user,
        }),
    ))
}

/// One account.
///
/// GET /api/admin/users/{id}
///
/// # Errors
///
/// Returns 404 if the user doesn't exist.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
) -> Result<Json<UserResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// `PUT /api/admin/users/{id}` body.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserPayload {
    pub name: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserPayload {
    fn validate(&self) -> std::result::Result<(Option<&str>, Option<Role>), FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = match self.name.as_deref().map(validate_name).transpose() {
            Ok(name) => name,
            Err(AuthError::InvalidName(msg)) => {
                errors.add("name", msg);
                None
            }
            Err(e) => {
                errors.add("name", e.to_string());
                None
            }
        };
        let role = match self.role.as_deref().map(str::parse::<Role>).transpose() {
            Ok(role) => role,
            Err(msg) => {
                errors.add("role", msg);
                None
            }
        };

        errors.finish_with((name, role))
    }
}

/// Change an account's name and/or role.
///
/// PUT /api/admin/users/{id}
///
/// # Errors
///
/// Returns 404 for an unknown user, 400 for an invalid name or role.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    PathParam(id): PathParam<UserId>,
    JsonBody(payload): JsonBody<UpdateUserPayload>,
) -> Result<Json<UserResponse>> {
    let (name, role) = payload.validate().map_err(AppError::Validation)?;
    let user = UserRepository::new(state.pool())
        .update(id, name, role)
        .await?;

    info!(role = %user.role, "User updated by admin");

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

/// Delete an account. Admins cannot delete themselves.
///
/// DELETE /api/admin/users/{id}
///
/// # Errors
///
/// Returns 400 for the caller's own account, 404 for an unknown user.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    PathParam(id): PathParam<UserId>,
) -> Result<Json<DeletedResponse>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("User".to_string()));
    }

    info!("User deleted by admin");
    Ok(Json(DeletedResponse { success: true }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_payload_partial() {
        let payload = UpdateUserPayload {
            name: None,
            role: Some("editor".into()),
        };
        let (name, role) = payload.validate().unwrap();
        assert_eq!(name, None);
        assert_eq!(role, Some(Role::Editor));
    }

    #[test]
    fn test_update_payload_rejects_bad_values() {
        let payload = UpdateUserPayload {
            name: Some("   ".into()),
            role: Some("root".into()),
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.get("name").is_some());
        assert_eq!(errors.get("role"), Some("invalid role: root"));
    }

    #[test]
    fn test_update_payload_trims_name() {
        let payload = UpdateUserPayload {
            name: Some("  Meera  ".into()),
            role: None,
        };
        assert_eq!(payload.validate().unwrap().0, Some("Meera"));
    }
}
