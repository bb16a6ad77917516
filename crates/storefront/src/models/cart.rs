//! Denormalized cart and wishlist lines.

use serde::Serialize;

use marigold_core::{ProductId, Quantity};

use super::Product;

/// One cart line as returned to clients.
///
/// Recomputed on every read from the live product row, so `price` always
/// reflects the current discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product id.
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    /// Unit price after discount.
    pub price: i64,
    pub original_price: i64,
    pub discount: i32,
    pub image: Option<String>,
    pub stock: i32,
    pub quantity: i32,
}

impl CartLine {
    #[must_use]
    pub fn new(product: &Product, quantity: Quantity) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.discounted_price(),
            original_price: product.price,
            discount: product.discount,
            image: product.image.clone(),
            stock: product.stock,
            quantity: quantity.get(),
        }
    }
}

/// Wishlist entries carry the same pricing as cart lines, without quantity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistLine {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: i64,
    pub original_price: i64,
    pub discount: i32,
    pub image: Option<String>,
    pub in_stock: bool,
}

impl From<&Product> for WishlistLine {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.discounted_price(),
            original_price: product.price,
            discount: product.discount,
            image: product.image.clone(),
            in_stock: product.stock > 0,
        }
    }
}
