//! Orders and checkout shipping details.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use marigold_core::{OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

/// Shipping and contact details captured at checkout.
///
/// Copied onto the order so later address-book edits never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub payment_method: String,
    pub shipping_method: String,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    #[serde(rename = "razorpayOrderId")]
    pub gateway_order_id: String,
    pub payment_id: Option<String>,
    pub payment_verified: bool,
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_address: Json<ShippingDetails>,
    /// Amount charged, in minor units.
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of one purchased product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    /// Discounted unit price at checkout, whole units.
    pub price: i64,
    pub quantity: i32,
    pub image: Option<String>,
}

/// An order with its items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
