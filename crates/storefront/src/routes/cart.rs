//! Cart route handlers.
//!
//! The same endpoints serve both carts: signed-in users get the persisted
//! cart, everyone else the guest cart held in their session.

use axum::{Json, Router, extract::State, routing::{get, post}};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use marigold_core::{CartEntry, ProductId, Quantity};

use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{JsonBody, QueryParams};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CartLine, CurrentUser};
use crate::services::cart::{CartService, GuestCart, SkippedLine, SyncLine};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(add).put(update).delete(remove))
        .route("/sync", post(sync))
}

/// Cart body returned by every cart endpoint.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
}

/// `POST` and `PUT /api/cart` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
}

impl CartItemPayload {
    /// Validate, using `default_quantity` when none is given.
    fn validate(
        self,
        default_quantity: Option<Quantity>,
    ) -> std::result::Result<(ProductId, Quantity), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.product_id.is_none() {
            errors.add("productId", "productId is required");
        }
        let quantity = match (self.quantity, default_quantity) {
            (Some(q), _) => Quantity::new(q)
                .map_err(|e| errors.add("quantity", e.to_string()))
                .ok(),
            (None, Some(q)) => Some(q),
            (None, None) => {
                errors.add("quantity", "quantity is required");
                None
            }
        };

        match (self.product_id, quantity) {
            (Some(product_id), Some(quantity)) => errors.finish_with((product_id, quantity)),
            _ => Err(errors),
        }
    }
}

/// Which cart a request operates on.
enum Cart<'a> {
    User(CartService<'a>, &'a CurrentUser),
    Guest(GuestCart<'a>),
}

impl<'a> Cart<'a> {
    fn new(state: &'a AppState, session: &'a Session, user: Option<&'a CurrentUser>) -> Self {
        match user {
            Some(user) => Self::User(CartService::new(state.pool(), state.cart_locks()), user),
            None => Self::Guest(GuestCart::new(state.pool(), session)),
        }
    }
}

/// Current cart.
///
/// GET /api/cart
///
/// # Errors
///
/// Returns an error if the database or session store fails.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartResponse>> {
    let items = match Cart::new(&state, &session, user.as_ref()) {
        Cart::User(service, user) => service.view(user.id).await?,
        Cart::Guest(guest) => guest.view().await?,
    };
    Ok(Json(CartResponse { items }))
}

/// Add a product; quantity defaults to 1 and adds to an existing line.
///
/// POST /api/cart
///
/// # Errors
///
/// Returns 400 for an invalid body and 404 for an unknown product.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    JsonBody(payload): JsonBody<CartItemPayload>,
) -> Result<Json<CartResponse>> {
    let (product_id, quantity) = payload
        .validate(Some(Quantity::ONE))
        .map_err(AppError::Validation)?;

    let items = match Cart::new(&state, &session, user.as_ref()) {
        Cart::User(service, user) => service.add(user.id, product_id, quantity).await?,
        Cart::Guest(guest) => guest.add(product_id, quantity).await?,
    };
    Ok(Json(CartResponse { items }))
}

/// Set the quantity of a line already in the cart.
///
/// PUT /api/cart
///
/// # Errors
///
/// Returns 400 for a quantity below 1 and 404 if the line is absent.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    JsonBody(payload): JsonBody<CartItemPayload>,
) -> Result<Json<CartResponse>> {
    let (product_id, quantity) = payload.validate(None).map_err(AppError::Validation)?;

    let items = match Cart::new(&state, &session, user.as_ref()) {
        Cart::User(service, user) => service.update(user.id, product_id, quantity).await?,
        Cart::Guest(guest) => guest.update(product_id, quantity).await?,
    };
    Ok(Json(CartResponse { items }))
}

/// `DELETE /api/cart` query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParams {
    pub product_id: Option<ProductId>,
}

/// Remove one line, or empty the cart when no `productId` is given.
///
/// DELETE /api/cart?productId=
///
/// # Errors
///
/// Returns an error if the database or session store fails.
#[instrument(skip_all, fields(product_id = ?params.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    QueryParams(params): QueryParams<RemoveParams>,
) -> Result<Json<CartResponse>> {
    let items = match (Cart::new(&state, &session, user.as_ref()), params.product_id) {
        (Cart::User(service, user), Some(id)) => service.remove(user.id, id).await?,
        (Cart::User(service, user), None) => service.clear(user.id).await?,
        (Cart::Guest(guest), Some(id)) => guest.remove(id).await?,
        (Cart::Guest(guest), None) => guest.clear().await?,
    };
    Ok(Json(CartResponse { items }))
}

/// `POST /api/cart/sync` body.
#[derive(Debug, Default, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub items: Vec<SyncLine>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub items: Vec<CartLine>,
    pub merged: Vec<CartEntry>,
    pub skipped: Vec<SkippedLine>,
}

/// Merge a client-held guest cart into the signed-in user's cart.
///
/// POST /api/cart/sync
///
/// Lines are applied together or not at all; unknown products and invalid
/// quantities are reported in `skipped`.
///
/// # Errors
///
/// Returns 401 without a session user, or the database error that rolled
/// the merge back.
#[instrument(skip_all, fields(user_id = %user.id, lines = payload.items.len()))]
pub async fn sync(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(payload): JsonBody<SyncPayload>,
) -> Result<Json<SyncResponse>> {
    let service = CartService::new(state.pool(), state.cart_locks());
    let report = service.merge_guest_cart(user.id, &payload.items).await?;
    let items = service.view(user.id).await?;

    Ok(Json(SyncResponse {
        items,
        merged: report.merged,
        skipped: report.skipped,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(product_id: Option<i32>, quantity: Option<i64>) -> CartItemPayload {
        CartItemPayload {
            product_id: product_id.map(ProductId::new),
            quantity,
        }
    }

    #[test]
    fn test_add_defaults_to_one() {
        let (id, quantity) = payload(Some(7), None).validate(Some(Quantity::ONE)).unwrap();
        assert_eq!(id, ProductId::new(7));
        assert_eq!(quantity, Quantity::ONE);
    }

    #[test]
    fn test_update_requires_quantity() {
        let errors = payload(Some(7), None).validate(None).unwrap_err();
        assert_eq!(errors.get("quantity"), Some("quantity is required"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let errors = payload(Some(7), Some(0)).validate(None).unwrap_err();
        assert!(errors.get("quantity").is_some());
        assert!(errors.get("productId").is_none());
    }

    #[test]
    fn test_missing_product_and_quantity_reported_together() {
        let errors = payload(None, Some(-2)).validate(Some(Quantity::ONE)).unwrap_err();
        assert!(errors.get("productId").is_some());
        assert!(errors.get("quantity").is_some());
    }

    #[test]
    fn test_sync_payload_shape() {
        let body: SyncPayload = serde_json::from_str(
            r#"{"items":[{"productId":3,"quantity":2},{"productId":9,"quantity":1}]}"#,
        )
        .unwrap();
        assert_eq!(body.items.len(), 2);
        assert_eq!(body.items[0].product_id, ProductId::new(3));
    }
}
