//! Address book route handlers. All require a signed-in user.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use tracing::instrument;

use marigold_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput, AddressPayload};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", put(update).delete(delete))
        .route("/{id}/default", post(set_default))
}

#[derive(Debug, Serialize)]
pub struct AddressListResponse {
    pub success: bool,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub success: bool,
    pub address: Address,
}

fn respond(address: Address) -> Json<AddressResponse> {
    Json(AddressResponse {
        success: true,
        address,
    })
}

/// List the user's addresses, default first.
///
/// GET /api/addresses
///
/// # Errors
///
/// Returns 401 without a session user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AddressListResponse>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(AddressListResponse {
        success: true,
        addresses,
    }))
}

/// Add an address. The first one becomes the default.
///
/// POST /api/addresses
///
/// # Errors
///
/// Returns 400 with field details for missing fields.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(payload): JsonBody<AddressPayload>,
) -> Result<(StatusCode, Json<AddressResponse>)> {
    let input = AddressInput::try_from(payload).map_err(AppError::Validation)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, respond(address)))
}

/// Replace an address.
///
/// PUT /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address doesn't belong to the user.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<AddressId>,
    JsonBody(payload): JsonBody<AddressPayload>,
) -> Result<Json<AddressResponse>> {
    let input = AddressInput::try_from(payload).map_err(AppError::Validation)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await?;
    Ok(respond(address))
}

/// Make an address the default, clearing the previous one.
///
/// POST /api/addresses/{id}/default
///
/// # Errors
///
/// Returns 404 if the address doesn't belong to the user.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<AddressId>,
) -> Result<Json<AddressResponse>> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(respond(address))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

/// Delete an address. Deleting the default leaves the user without one.
///
/// DELETE /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address doesn't belong to the user.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<AddressId>,
) -> Result<Json<DeletedResponse>> {
    if !AddressRepository::new(state.pool()).delete(user.id, id).await? {
        return Err(AppError::NotFound("Address".to_string()));
    }
    Ok(Json(DeletedResponse { success: true }))
}
