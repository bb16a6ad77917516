//! Checkout and order history route handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use marigold_core::{OrderId, OrderStatus, PaymentStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Order, OrderDetail};
use crate::services::checkout::{
    CheckoutRequest, CheckoutService, CreateOrderPayload, VerifyPaymentPayload,
    VerifyPaymentRequest,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/create", post(create))
        .route("/verify-payment", post(verify_payment))
        .route("/{id}", get(show))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub currency: String,
    pub amount: i64,
}

/// Open a gateway order for the cart total and record a pending order.
///
/// POST /api/orders/create
///
/// Requires a signed-in user, except outside production where anonymous
/// orders are accepted.
///
/// # Errors
///
/// Returns 401 without a user in production, 400 for invalid input or a
/// total that does not match the catalog, 502 if the gateway fails.
#[instrument(skip_all, fields(user_id = ?user.as_ref().map(|u| u.id)))]
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    JsonBody(payload): JsonBody<CreateOrderPayload>,
) -> Result<Json<CreateOrderResponse>> {
    if user.is_none() && !state.config().allows_guest_checkout() {
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    }

    let request = CheckoutRequest::try_from(payload).map_err(AppError::Validation)?;
    let created = CheckoutService::new(state.pool(), state.gateway(), state.config().checkout)
        .create_order(user.map(|u| u.id), &request)
        .await?;

    add_breadcrumb(
        "checkout",
        "Order created",
        Some(&[("gateway_order_id", created.gateway_order_id.as_str())]),
    );

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: created.order.id,
        razorpay_order_id: created.gateway_order_id,
        currency: created.order.currency,
        amount: created.order.amount_minor,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            payment_status: order.payment_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: OrderSummary,
}

/// Check the gateway's payment signature and mark the order paid.
///
/// POST /api/orders/verify-payment
///
/// Verifying an already paid order succeeds without changing it.
///
/// # Errors
///
/// Returns 400 for a bad signature or mismatched gateway order, 404 if the
/// order is missing or belongs to someone else.
#[instrument(skip_all, fields(user_id = ?user.as_ref().map(|u| u.id)))]
pub async fn verify_payment(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    JsonBody(payload): JsonBody<VerifyPaymentPayload>,
) -> Result<Json<VerifyPaymentResponse>> {
    let request = VerifyPaymentRequest::try_from(payload).map_err(AppError::Validation)?;
    let verified = CheckoutService::new(state.pool(), state.gateway(), state.config().checkout)
        .verify_payment(user.map(|u| u.id), &request)
        .await?;

    let message = if verified.already_verified {
        "Payment already verified"
    } else {
        "Payment verified successfully"
    };

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message,
        order: OrderSummary::from(&verified.order),
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// The signed-in user's orders, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// Returns 401 without a session user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrderListResponse>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: OrderDetail,
}

/// One of the signed-in user's orders with its items.
///
/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 if the order doesn't exist or belongs to another user.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}
