//! Admin API under `/api/admin`.
//!
//! Every group sits behind [`require_role`], which re-reads the caller's
//! role from the database:
//!
//! - products, upload: `admin`, `editor`
//! - users: `admin`

pub mod products;
pub mod upload;
pub mod users;

use axum::{Router, middleware::from_fn_with_state};

use marigold_core::Role;

use crate::middleware::{AllowedRoles, require_role};
use crate::state::AppState;

/// Build the admin router. Needs the state up front for the role gates.
pub fn router(state: &AppState) -> Router<AppState> {
    let catalog = Router::new()
        .nest("/products", products::router())
        .nest("/upload", upload::router())
        .route_layer(from_fn_with_state(
            (state.clone(), AllowedRoles(Role::CATALOG_MANAGERS)),
            require_role,
        ));

    let accounts = Router::new()
        .nest("/users", users::router())
        .route_layer(from_fn_with_state(
            (state.clone(), AllowedRoles(Role::USER_MANAGERS)),
            require_role,
        ));

    catalog.merge(accounts)
}
