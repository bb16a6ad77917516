//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Catalog
//! GET  /api/products                    - Listing with filters and pagination
//! GET  /api/products/{idOrSlug}         - Detail with related products and reviews
//! GET  /api/products/{id}/reviews       - Reviews
//! POST /api/products/{id}/reviews       - Add a review (auth)
//!
//! # Cart (session user or guest)
//! GET    /api/cart                      - Current cart
//! POST   /api/cart                      - Add {productId, quantity?}
//! PUT    /api/cart                      - Set quantity {productId, quantity}
//! DELETE /api/cart?productId=           - Remove a line, or clear
//! POST   /api/cart/sync                 - Merge a client-held guest cart (auth)
//!
//! # Wishlist (auth)
//! GET    /api/wishlist
//! POST   /api/wishlist                  - {productId}
//! DELETE /api/wishlist/{productId}
//!
//! # Checkout and orders
//! POST /api/orders/create               - Open a gateway order
//! POST /api/orders/verify-payment       - Verify the payment signature
//! GET  /api/orders                      - Order history (auth)
//! GET  /api/orders/{id}                 - Order detail (auth)
//!
//! # Addresses (auth)
//! GET|POST   /api/addresses
//! PUT|DELETE /api/addresses/{id}
//! POST       /api/addresses/{id}/default
//!
//! # Auth
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Admin (role gated)
//! GET|POST       /api/admin/products
//! GET|PUT|DELETE /api/admin/products/{id}
//! POST           /api/admin/upload
//! GET|POST       /api/admin/users
//! GET|PUT|DELETE /api/admin/users/{id}
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::Router;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Everything under `/api` except auth, which has its own tighter limiter.
fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/wishlist", wishlist::router())
        .nest("/orders", orders::router())
        .nest("/addresses", addresses::router())
        .nest("/admin", admin::router(state))
        .layer(api_rate_limiter(state.config()))
}

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/auth", auth::router(state))
        .nest("/api", api_routes(state))
}

/// Serialize a response body that borrows from handler locals.
pub(crate) fn to_json(body: &impl Serialize) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| AppError::Internal(format!("serialize response: {e}")))
}
