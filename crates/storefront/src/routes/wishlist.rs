//! Wishlist route handlers. All require a signed-in user.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use marigold_core::{ProductId, UserId};

use crate::db::{ProductRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAuth;
use crate::models::{Product, WishlistLine};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(add))
        .route("/{product_id}", delete(remove))
}

#[derive(Debug, Serialize)]
pub struct WishlistResponse {
    pub success: bool,
    pub items: Vec<WishlistLine>,
}

/// Saved products priced from the live catalog, oldest first. Entries
/// whose product was deleted are pruned.
async fn load(state: &AppState, user_id: UserId) -> Result<Json<WishlistResponse>> {
    let wishlist = WishlistRepository::new(state.pool());
    let ids = wishlist.product_ids(user_id).await?;
    let products: HashMap<ProductId, Product> = ProductRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let (present, missing): (Vec<ProductId>, Vec<ProductId>) =
        ids.into_iter().partition(|id| products.contains_key(id));
    if !missing.is_empty() {
        warn!(
            user_id = %user_id,
            missing = ?missing,
            "Pruning wishlist entries for deleted products"
        );
        wishlist.remove(user_id, &missing).await?;
    }

    let items = present
        .iter()
        .filter_map(|id| products.get(id))
        .map(WishlistLine::from)
        .collect();
    Ok(Json(WishlistResponse {
        success: true,
        items,
    }))
}

/// The user's wishlist.
///
/// GET /api/wishlist
///
/// # Errors
///
/// Returns 401 without a session user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<WishlistResponse>> {
    load(&state, user.id).await
}

/// `POST /api/wishlist` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistPayload {
    pub product_id: Option<ProductId>,
}

/// Save a product. Saving it twice is a no-op.
///
/// POST /api/wishlist
///
/// # Errors
///
/// Returns 400 without `productId`, 404 for an unknown product.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(payload): JsonBody<WishlistPayload>,
) -> Result<Json<WishlistResponse>> {
    let product_id = payload
        .product_id
        .ok_or_else(|| AppError::field("productId", "productId is required"))?;

    if ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("Product {product_id}")));
    }

    WishlistRepository::new(state.pool())
        .add(user.id, product_id)
        .await?;
    load(&state, user.id).await
}

/// Remove a saved product; removing an absent one is not an error.
///
/// DELETE /api/wishlist/{product_id}
///
/// # Errors
///
/// Returns 401 without a session user.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(product_id): PathParam<ProductId>,
) -> Result<Json<WishlistResponse>> {
    WishlistRepository::new(state.pool())
        .remove(user.id, &[product_id])
        .await?;
    load(&state, user.id).await
}
