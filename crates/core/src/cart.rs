//! Line-item container for carts that are not yet persisted.
//!
//! Guests keep their cart in the session as a [`CartState`]. On login the
//! lines are replayed, in order, into the account's stored cart.

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Errors from cart line operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartStateError {
    /// Quantity was zero, negative, or absurdly large.
    #[error("quantity must be between 1 and {max}")]
    InvalidQuantity {
        /// Largest quantity accepted on one line.
        max: i32,
    },
    /// Adding to a line would take it past the per-line limit.
    #[error("a cart line cannot hold more than {max}")]
    QuantityLimit {
        /// Largest quantity accepted on one line.
        max: i32,
    },
    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    MissingLine(ProductId),
}

/// A positive per-line quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// Upper bound for a single line.
    pub const MAX: i32 = 999;

    /// A quantity of one.
    pub const ONE: Self = Self(1);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartStateError::InvalidQuantity`] outside `1..=MAX`.
    pub fn new(value: i64) -> Result<Self, CartStateError> {
        match i32::try_from(value) {
            Ok(q) if (1..=Self::MAX).contains(&q) => Ok(Self(q)),
            _ => Err(CartStateError::InvalidQuantity { max: Self::MAX }),
        }
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Add two quantities.
    ///
    /// # Errors
    ///
    /// Returns [`CartStateError::QuantityLimit`] if the sum exceeds `MAX`.
    pub fn checked_add(self, other: Self) -> Result<Self, CartStateError> {
        match self.0.checked_add(other.0) {
            Some(sum) if sum <= Self::MAX => Ok(Self(sum)),
            _ => Err(CartStateError::QuantityLimit { max: Self::MAX }),
        }
    }
}

impl TryFrom<i64> for Quantity {
    type Error = CartStateError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

/// One product and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Ordered set of cart lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    entries: Vec<CartEntry>,
}

impl CartState {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// Returns true if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add `quantity` of a product, incrementing an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartStateError::QuantityLimit`] if the line would exceed
    /// [`Quantity::MAX`]; the cart is left unchanged.
    pub fn add(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), CartStateError> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = entry.quantity.checked_add(quantity)?;
        } else {
            self.entries.push(CartEntry {
                product_id,
                quantity,
            });
        }
        Ok(())
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartStateError::MissingLine`] if the product is not in the cart.
    pub fn update(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), CartStateError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.product_id == product_id)
            .ok_or(CartStateError::MissingLine(product_id))?;
        entry.quantity = quantity;
        Ok(())
    }

    /// Remove a line. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: ProductId) {
        self.entries.retain(|e| e.product_id != product_id);
    }

    /// Keep only lines whose product passes `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(ProductId) -> bool) {
        self.entries.retain(|e| keep(e.product_id));
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
