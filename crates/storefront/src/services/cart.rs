//! Cart operations for signed-in users and guests.
//!
//! Signed-in carts live in `storefront.cart_item`; guest carts live in the
//! session as a [`CartState`]. Both are rendered as [`CartLine`]s priced
//! from the live catalog on every read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_sessions::Session;
use tracing::{instrument, warn};

use marigold_core::{CartEntry, CartState, CartStateError, ProductId, Quantity, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::{CartLine, Product, session_keys};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    #[error(transparent)]
    InvalidQuantity(#[from] CartStateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Per-user async locks serializing cart writes with the read that follows.
///
/// Idle locks are evicted; a user who comes back simply gets a fresh one.
#[derive(Clone)]
pub struct CartLocks {
    locks: Cache<UserId, Arc<Mutex<()>>>,
}

impl CartLocks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(600))
                .build(),
        }
    }

    /// Wait for exclusive access to one user's cart.
    pub async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(user_id, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}

impl Default for CartLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// One line submitted for a merge, as the client sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl From<&CartEntry> for SyncLine {
    fn from(entry: &CartEntry) -> Self {
        Self {
            product_id: entry.product_id,
            quantity: i64::from(entry.quantity.get()),
        }
    }
}

/// A guest line that could not be merged, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    pub product_id: ProductId,
    pub reason: String,
}

/// Outcome of merging a guest cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub merged: Vec<CartEntry>,
    pub skipped: Vec<SkippedLine>,
}

impl MergeReport {
    /// Move lines the store refused for exceeding the quantity limit from
    /// `merged` to `skipped`.
    fn reject_over_limit(&mut self, rejected: &[ProductId]) {
        if rejected.is_empty() {
            return;
        }
        let reason = CartStateError::QuantityLimit { max: Quantity::MAX }.to_string();
        let (kept, refused): (Vec<_>, Vec<_>) = self
            .merged
            .drain(..)
            .partition(|e| !rejected.contains(&e.product_id));
        self.merged = kept;
        self.skipped
            .extend(refused.into_iter().map(|e| SkippedLine {
                product_id: e.product_id,
                reason: reason.clone(),
            }));
    }
}

/// Cart service for signed-in users.
pub struct CartService<'a> {
    pool: &'a PgPool,
    locks: &'a CartLocks,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, locks: &'a CartLocks) -> Self {
        Self { pool, locks }
    }

    fn carts(&self) -> CartRepository<'a> {
        CartRepository::new(self.pool)
    }

    fn products(&self) -> ProductRepository<'a> {
        ProductRepository::new(self.pool)
    }

    /// The user's cart, priced from the live catalog.
    ///
    /// Lines whose product has been deleted are dropped and pruned.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    #[instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        let state = self.carts().load(user_id).await?;
        let (lines, missing) = price_lines(self.pool, &state).await?;

        if !missing.is_empty() {
            warn!(
                user_id = %user_id,
                missing = ?missing,
                "Pruning cart lines for deleted products"
            );
            self.carts().prune(user_id, &missing).await?;
        }

        Ok(lines)
    }

    /// Add `quantity` of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product doesn't exist and
    /// `CartError::InvalidQuantity` if the line would exceed the limit.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, CartError> {
        self.require_product(product_id).await?;

        let _guard = self.locks.acquire(user_id).await;
        if !self.carts().add(user_id, product_id, quantity).await? {
            return Err(CartStateError::QuantityLimit { max: Quantity::MAX }.into());
        }
        self.view(user_id).await
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, CartError> {
        let _guard = self.locks.acquire(user_id).await;
        if !self.carts().set_quantity(user_id, product_id, quantity).await? {
            return Err(CartError::LineNotFound(product_id));
        }
        self.view(user_id).await
    }

    /// Remove a line; removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<CartLine>, CartError> {
        let _guard = self.locks.acquire(user_id).await;
        self.carts().remove(user_id, product_id).await?;
        self.view(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        let _guard = self.locks.acquire(user_id).await;
        self.carts().clear(user_id).await?;
        Ok(Vec::new())
    }

    /// Replay guest lines into the user's cart, in order.
    ///
    /// Lines for unknown products, with an invalid quantity, or that would
    /// push a stored line past the limit are reported as skipped. The rest are applied in one transaction: if it fails nothing
    /// is merged and the error is returned so the caller can keep the guest
    /// cart for another attempt.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge transaction fails.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn merge_guest_cart(
        &self,
        user_id: UserId,
        lines: &[SyncLine],
    ) -> Result<MergeReport, CartError> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let existing: Vec<ProductId> = self
            .products()
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let mut report = MergeReport::default();
        for line in lines {
            if !existing.contains(&line.product_id) {
                report.skipped.push(SkippedLine {
                    product_id: line.product_id,
                    reason: "product no longer exists".to_string(),
                });
                continue;
            }
            match Quantity::new(line.quantity) {
                Ok(quantity) => report.merged.push(CartEntry {
                    product_id: line.product_id,
                    quantity,
                }),
                Err(e) => report.skipped.push(SkippedLine {
                    product_id: line.product_id,
                    reason: e.to_string(),
                }),
            }
        }

        if !report.merged.is_empty() {
            let _guard = self.locks.acquire(user_id).await;
            let rejected = self.carts().merge(user_id, &report.merged).await?;
            report.reject_over_limit(&rejected);
        }

        Ok(report)
    }

    async fn require_product(&self, product_id: ProductId) -> Result<Product, CartError> {
        self.products()
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))
    }
}

/// Guest cart held in the session.
pub struct GuestCart<'a> {
    pool: &'a PgPool,
    session: &'a Session,
}

impl<'a> GuestCart<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session) -> Self {
        Self { pool, session }
    }

    /// Stored guest lines; empty if none.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` if the session store fails.
    pub async fn state(&self) -> Result<CartState, CartError> {
        Ok(self
            .session
            .get::<CartState>(session_keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, state: &CartState) -> Result<(), CartError> {
        if state.is_empty() {
            self.session
                .remove::<CartState>(session_keys::GUEST_CART)
                .await?;
        } else {
            self.session.insert(session_keys::GUEST_CART, state).await?;
        }
        Ok(())
    }

    /// Forget the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` if the session store fails.
    pub async fn discard(&self) -> Result<(), CartError> {
        self.session
            .remove::<CartState>(session_keys::GUEST_CART)
            .await?;
        Ok(())
    }

    /// The guest cart priced from the live catalog. Lines for deleted
    /// products are dropped from the session too.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the database or session store fails.
    pub async fn view(&self) -> Result<Vec<CartLine>, CartError> {
        let mut state = self.state().await?;
        let (lines, missing) = price_lines(self.pool, &state).await?;

        if !missing.is_empty() {
            warn!(missing = ?missing, "Dropping guest cart lines for deleted products");
            state.retain(|id| !missing.contains(&id));
            self.save(&state).await?;
        }

        Ok(lines)
    }

    /// Add `quantity` of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product doesn't exist and
    /// `CartError::InvalidQuantity` if the line would exceed the limit.
    pub async fn add(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, CartError> {
        if ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .is_none()
        {
            return Err(CartError::ProductNotFound(product_id));
        }

        let mut state = self.state().await?;
        state.add(product_id, quantity)?;
        self.save(&state).await?;
        self.view().await
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub async fn update(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, CartError> {
        let mut state = self.state().await?;
        state
            .update(product_id, quantity)
            .map_err(|_| CartError::LineNotFound(product_id))?;
        self.save(&state).await?;
        self.view().await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the database or session store fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<Vec<CartLine>, CartError> {
        let mut state = self.state().await?;
        state.remove(product_id);
        self.save(&state).await?;
        self.view().await
    }

    /// Empty the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` if the session store fails.
    pub async fn clear(&self) -> Result<Vec<CartLine>, CartError> {
        self.discard().await?;
        Ok(Vec::new())
    }
}

/// Price cart lines against the catalog, keeping cart order.
///
/// Returns the lines and the ids of products that no longer exist.
async fn price_lines(
    pool: &PgPool,
    state: &CartState,
) -> Result<(Vec<CartLine>, Vec<ProductId>), RepositoryError> {
    let ids: Vec<ProductId> = state.entries().iter().map(|e| e.product_id).collect();
    let products: HashMap<ProductId, Product> = ProductRepository::new(pool)
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(build_lines(state, &products))
}

fn build_lines(
    state: &CartState,
    products: &HashMap<ProductId, Product>,
) -> (Vec<CartLine>, Vec<ProductId>) {
    let mut lines = Vec::with_capacity(state.len());
    let mut missing = Vec::new();
    for entry in state.entries() {
        match products.get(&entry.product_id) {
            Some(product) => lines.push(CartLine::new(product, entry.quantity)),
            None => missing.push(entry.product_id),
        }
    }
    (lines, missing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    use super::*;

    fn product(id: i32, price: i64, discount: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            short_description: String::new(),
            image: None,
            images: vec![],
            brand: None,
            stock: 5,
            price,
            discount,
            sizes: vec![],
            colors: vec![],
            categories: vec![],
            tags: vec![],
            specifications: Json(vec![]),
            rating: Decimal::ZERO,
            review_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_build_lines_keeps_order_and_reports_missing() {
        let mut state = CartState::new();
        state.add(ProductId::new(2), qty(1)).unwrap();
        state.add(ProductId::new(9), qty(4)).unwrap();
        state.add(ProductId::new(1), qty(2)).unwrap();

        let products: HashMap<_, _> = [product(1, 1000, 10), product(2, 500, 0)]
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let (lines, missing) = build_lines(&state, &products);
        let ids: Vec<i32> = lines.iter().map(|l| l.id.as_i32()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(missing, vec![ProductId::new(9)]);
        assert_eq!(lines[1].price, 900);
        assert_eq!(lines[1].original_price, 1000);
    }

    #[test]
    fn test_add_twice_sums_quantity() {
        let mut state = CartState::new();
        state.add(ProductId::new(3), qty(2)).unwrap();
        state.add(ProductId::new(3), qty(1)).unwrap();

        let products: HashMap<_, _> = std::iter::once((ProductId::new(3), product(3, 100, 0)))
            .collect();
        let (lines, _) = build_lines(&state, &products);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
    }

    #[test]
    fn test_sync_line_deserializes_camel_case() {
        let line: SyncLine =
            serde_json::from_str(r#"{"productId": 7, "quantity": 0}"#).unwrap();
        assert_eq!(line.product_id, ProductId::new(7));
        assert_eq!(line.quantity, 0);
    }

    #[test]
    fn test_merge_report_shape() {
        let report = MergeReport {
            merged: vec![CartEntry {
                product_id: ProductId::new(1),
                quantity: qty(2),
            }],
            skipped: vec![SkippedLine {
                product_id: ProductId::new(5),
                reason: "product no longer exists".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["merged"][0]["productId"], 1);
        assert_eq!(json["merged"][0]["quantity"], 2);
        assert_eq!(json["skipped"][0]["productId"], 5);
    }

    #[test]
    fn test_guest_add_past_limit_is_a_quantity_error() {
        let mut state = CartState::new();
        state.add(ProductId::new(3), qty(999)).unwrap();
        let err = CartError::from(state.add(ProductId::new(3), qty(1)).unwrap_err());
        assert!(matches!(
            err,
            CartError::InvalidQuantity(CartStateError::QuantityLimit { max: 999 })
        ));
    }

    #[test]
    fn test_over_limit_lines_move_to_skipped() {
        let mut report = MergeReport {
            merged: vec![
                CartEntry {
                    product_id: ProductId::new(1),
                    quantity: qty(2),
                },
                CartEntry {
                    product_id: ProductId::new(2),
                    quantity: qty(900),
                },
            ],
            skipped: vec![],
        };
        report.reject_over_limit(&[ProductId::new(2)]);

        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged[0].product_id, ProductId::new(1));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].product_id, ProductId::new(2));
        assert!(report.skipped[0].reason.contains("999"));
    }

    #[tokio::test]
    async fn test_cart_locks_serialize_per_user() {
        let locks = CartLocks::new();
        let guard = locks.acquire(UserId::new(1)).await;

        // Another user is not blocked.
        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(UserId::new(2)),
        )
        .await;
        assert!(other.is_ok());

        // The same user waits.
        let same = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(UserId::new(1)),
        )
        .await;
        assert!(same.is_err());

        drop(guard);
        let again = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(UserId::new(1)),
        )
        .await;
        assert!(again.is_ok());
    }
}
