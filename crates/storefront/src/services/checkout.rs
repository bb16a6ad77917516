//! Checkout: order creation against the payment gateway and payment
//! verification.
//!
//! Prices always come from the catalog. The amount the client submits is
//! only accepted if it agrees with the server total within the configured
//! tolerance, and it is what the gateway charges.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use marigold_core::pricing::to_minor_units;
use marigold_core::{
    CartEntry, CartState, Currency, Email, OrderId, OrderTotals, PaymentStatus, ProductId,
    Quantity, UserId,
};

use super::gateway::{CreateOrderRequest, GatewayError, PaymentGateway};
use crate::config::CheckoutConfig;
use crate::db::orders::NewOrder;
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::FieldErrors;
use crate::models::{Order, OrderItem, Product, ShippingDetails};

/// Errors from checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid checkout request")]
    Validation(FieldErrors),

    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    #[error("amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("invalid payment signature")]
    InvalidSignature,

    #[error("order not found")]
    OrderNotFound,

    #[error("gateway order id does not match the order")]
    GatewayOrderMismatch,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One checkout line as submitted. Other client fields (name, price, image)
/// are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemPayload {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
}

/// Shipping block as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_method: Option<String>,
}

/// `POST /api/orders/create` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Vec<CheckoutItemPayload>,
    pub shipping_details: Option<ShippingPayload>,
}

/// A fully validated checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Charge in minor units.
    pub amount: i64,
    pub currency: Currency,
    /// Requested lines; repeated products are folded together.
    pub items: Vec<CartEntry>,
    pub shipping: ShippingDetails,
}

impl TryFrom<CreateOrderPayload> for CheckoutRequest {
    type Error = FieldErrors;

    fn try_from(payload: CreateOrderPayload) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();

        let amount = match payload.amount {
            Some(a) if a > 0 => a,
            Some(_) => {
                errors.add("amount", "amount must be a positive integer");
                0
            }
            None => {
                errors.add("amount", "amount is required");
                0
            }
        };

        let currency = match payload.currency.as_deref().map(Currency::parse) {
            Some(Ok(c)) => c,
            Some(Err(e)) => {
                errors.add("currency", e.to_string());
                Currency::default()
            }
            None => {
                errors.add("currency", "currency is required");
                Currency::default()
            }
        };

        if payload.items.is_empty() {
            errors.add("items", "at least one item is required");
        }
        let mut cart = CartState::new();
        for (i, item) in payload.items.iter().enumerate() {
            let Some(product_id) = item.product_id else {
                errors.add(format!("items[{i}].productId"), "productId is required");
                continue;
            };
            if let Err(e) =
                Quantity::new(item.quantity.unwrap_or(0)).and_then(|q| cart.add(product_id, q))
            {
                errors.add(format!("items[{i}].quantity"), e.to_string());
            }
        }

        let shipping = validate_shipping(payload.shipping_details.unwrap_or_default(), &mut errors);

        errors.finish_with(Self {
            amount,
            currency,
            items: cart.entries().to_vec(),
            shipping,
        })
    }
}

fn validate_shipping(payload: ShippingPayload, errors: &mut FieldErrors) -> ShippingDetails {
    let mut required = |field: &str, value: Option<String>| {
        let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
        if value.is_empty() {
            errors.add(
                format!("shippingDetails.{field}"),
                format!("{field} is required"),
            );
        }
        value
    };

    let details = ShippingDetails {
        name: required("name", payload.name),
        email: required("email", payload.email),
        phone: required("phone", payload.phone),
        address: required("address", payload.address),
        city: required("city", payload.city),
        state: required("state", payload.state),
        postal_code: required("postalCode", payload.postal_code),
        country: required("country", payload.country),
        payment_method: required("paymentMethod", payload.payment_method),
        shipping_method: required("shippingMethod", payload.shipping_method),
    };

    if !details.email.is_empty()
        && let Err(e) = Email::parse(&details.email)
    {
        errors.add("shippingDetails.email", e.to_string());
    }

    details
}

/// `POST /api/orders/verify-payment` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentPayload {
    pub payment_id: Option<String>,
    /// Gateway order id.
    pub order_id: Option<String>,
    pub signature: Option<String>,
    pub order_db_id: Option<OrderId>,
}

/// A validated verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyPaymentRequest {
    pub payment_id: String,
    pub gateway_order_id: String,
    pub signature: String,
    pub order_id: OrderId,
}

impl TryFrom<VerifyPaymentPayload> for VerifyPaymentRequest {
    type Error = FieldErrors;

    fn try_from(payload: VerifyPaymentPayload) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();
        let mut required = |field: &str, value: Option<String>| {
            let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
            if value.is_empty() {
                errors.add(field, format!("{field} is required"));
            }
            value
        };

        let payment_id = required("paymentId", payload.payment_id);
        let gateway_order_id = required("orderId", payload.order_id);
        let signature = required("signature", payload.signature);
        let order_id = payload.order_db_id.unwrap_or_else(|| {
            errors.add("orderDbId", "orderDbId is required");
            OrderId::new(0)
        });

        errors.finish_with(Self {
            payment_id,
            gateway_order_id,
            signature,
            order_id,
        })
    }
}

/// Result of a successful order creation.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    pub gateway_order_id: String,
}

/// Result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub order: Order,
    /// The order had already been marked paid before this call.
    pub already_verified: bool,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    gateway: &'a dyn PaymentGateway,
    config: CheckoutConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a dyn PaymentGateway,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            pool,
            gateway,
            config,
        }
    }

    /// Reprice, open a gateway order and record a pending order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::UnknownProduct` or `CheckoutError::AmountMismatch`
    /// before any gateway call, `CheckoutError::Gateway` if the gateway fails
    /// after retries.
    #[instrument(skip(self, request), fields(amount = request.amount, items = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Option<UserId>,
        request: &CheckoutRequest,
    ) -> Result<CreatedOrder, CheckoutError> {
        let ids: Vec<ProductId> = request.items.iter().map(|i| i.product_id).collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let (items, expected) = price_items(&request.items, &products)?;
        check_amount(request.amount, expected, self.config.price_tolerance_minor)?;

        let gateway_order = self
            .gateway
            .create_order(&CreateOrderRequest::new(
                request.amount,
                request.currency.as_str(),
            ))
            .await?;

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                user_id,
                gateway_order_id: &gateway_order.id,
                shipping: &request.shipping,
                amount_minor: request.amount,
                currency: request.currency.as_str(),
                totals: OrderTotals::from_amount_minor(request.amount),
                items: &items,
            })
            .await?;

        info!(order_id = %order.id, gateway_order_id = %gateway_order.id, "Order created");

        Ok(CreatedOrder {
            order,
            gateway_order_id: gateway_order.id,
        })
    }

    /// Verify a payment signature and mark the order paid.
    ///
    /// With a session user the order must belong to them; without one the
    /// order must have been placed without an account.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidSignature` without touching the order,
    /// `CheckoutError::OrderNotFound` for a missing or foreign order,
    /// `CheckoutError::GatewayOrderMismatch` if the ids disagree.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        user_id: Option<UserId>,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifiedPayment, CheckoutError> {
        if !self.gateway.verify_signature(
            &request.gateway_order_id,
            &request.payment_id,
            &request.signature,
        ) {
            warn!("Payment signature mismatch");
            return Err(CheckoutError::InvalidSignature);
        }

        let orders = OrderRepository::new(self.pool);
        let order = orders
            .get(request.order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.gateway_order_id != request.gateway_order_id {
            return Err(CheckoutError::GatewayOrderMismatch);
        }

        if PaymentTransition::for_status(order.payment_status) == PaymentTransition::AlreadyPaid {
            return Ok(VerifiedPayment {
                order,
                already_verified: true,
            });
        }

        if let Some(order) = orders.mark_paid(order.id, &request.payment_id).await? {
            info!(payment_id = %request.payment_id, "Payment verified");
            return Ok(VerifiedPayment {
                order,
                already_verified: false,
            });
        }

        // A concurrent verification won the update.
        let order = orders
            .get(request.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        Ok(VerifiedPayment {
            order,
            already_verified: true,
        })
    }
}

/// What a correctly signed payment does to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaymentTransition {
    /// Payment was recorded before; the order is returned untouched.
    AlreadyPaid,
    MarkPaid,
}

impl PaymentTransition {
    const fn for_status(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Completed => Self::AlreadyPaid,
            PaymentStatus::Pending | PaymentStatus::Failed | PaymentStatus::Refunded => {
                Self::MarkPaid
            }
        }
    }
}

/// Snapshot each line at its current discounted price and total the order
/// in minor units.
fn price_items(
    lines: &[CartEntry],
    products: &HashMap<ProductId, Product>,
) -> Result<(Vec<OrderItem>, i64), CheckoutError> {
    let mut total: i64 = 0;
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        let price = product.discounted_price();
        total = total.saturating_add(price.saturating_mul(i64::from(line.quantity.get())));
        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            price,
            quantity: line.quantity.get(),
            image: product.image.clone(),
        });
    }

    Ok((items, to_minor_units(total)))
}

fn check_amount(actual: i64, expected: i64, tolerance: i64) -> Result<(), CheckoutError> {
    if actual.abs_diff(expected) > tolerance.unsigned_abs() {
        warn!(actual, expected, "Checkout amount does not match catalog total");
        return Err(CheckoutError::AmountMismatch { expected, actual });
    }
    Ok(())
}
