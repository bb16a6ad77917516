//! Catalog management for admins and editors.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use tracing::{info, instrument};

use marigold_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireAuth;
use crate::models::{ProductInput, ProductPayload, ProductView};
use crate::routes::products::{ListParams, index as list};
use crate::routes::to_json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}

#[derive(Debug, Serialize)]
struct ProductResponse<'a> {
    success: bool,
    product: ProductView<'a>,
}

/// Catalog listing with the same filters as the public one.
///
/// GET /api/admin/products
///
/// # Errors
///
/// Returns a validation error for bad query parameters.
pub async fn index(
    state: State<AppState>,
    params: QueryParams<ListParams>,
) -> Result<Json<serde_json::Value>> {
    list(state, params).await
}

/// Create a product; the slug is derived from the name if absent.
///
/// POST /api/admin/products
///
/// # Errors
///
/// Returns 400 with field details for invalid input or a taken slug.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    JsonBody(payload): JsonBody<ProductPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let input = ProductInput::from_payload(payload, None).map_err(AppError::Validation)?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;

    info!(product_id = %product.id, slug = %product.slug, "Product created");

    let body = to_json(&ProductResponse {
        success: true,
        product: ProductView::from(&product),
    })?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// One product by id.
///
/// GET /api/admin/products/{id}
///
/// # Errors
///
/// Returns 404 if the product doesn't exist.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    Ok(Json(to_json(&ProductResponse {
        success: true,
        product: ProductView::from(&product),
    })?))
}

/// Update a product. Fields left out of the body keep their values.
///
/// PUT /api/admin/products/{id}
///
/// # Errors
///
/// Returns 404 for an unknown product, 400 for invalid input or a taken slug.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    PathParam(id): PathParam<ProductId>,
    JsonBody(payload): JsonBody<ProductPayload>,
) -> Result<Json<serde_json::Value>> {
    let repo = ProductRepository::new(state.pool());
    let existing = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let input = ProductInput::from_payload(payload, Some(&existing)).map_err(AppError::Validation)?;
    let product = repo.update(id, &input).await?;

    info!("Product updated");

    Ok(Json(to_json(&ProductResponse {
        success: true,
        product: ProductView::from(&product),
    })?))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

/// Delete a product. Cart and wishlist entries for it are pruned on their
/// next read; placed orders keep their snapshot.
///
/// DELETE /api/admin/products/{id}
///
/// # Errors
///
/// Returns 404 if the product doesn't exist.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<DeletedResponse>> {
    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Product".to_string()));
    }

    info!("Product deleted");
    Ok(Json(DeletedResponse { success: true }))
}
