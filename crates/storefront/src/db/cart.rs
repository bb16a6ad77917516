//! Persisted cart lines.

use sqlx::{PgExecutor, PgPool};

use marigold_core::{CartEntry, CartState, ProductId, Quantity, UserId};

use super::RepositoryError;

/// Repository for a user's stored cart.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cart lines in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored quantity is out
    /// of range.
    pub async fn load(&self, user_id: UserId) -> Result<CartState, RepositoryError> {
        let rows = sqlx::query_as::<_, (ProductId, i32)>(
            "SELECT product_id, quantity FROM storefront.cart_item WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut state = CartState::new();
        for (product_id, quantity) in rows {
            Quantity::new(i64::from(quantity))
                .and_then(|q| state.add(product_id, q))
                .map_err(|_| {
                    RepositoryError::DataCorruption(format!(
                        "cart line {product_id} has quantity {quantity}"
                    ))
                })?;
        }

        Ok(state)
    }

    /// Add to a line, creating it if absent.
    ///
    /// # Returns
    ///
    /// Returns `false`, leaving the line unchanged, if the sum would exceed
    /// [`Quantity::MAX`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        upsert(self.pool, user_id, product_id, quantity).await
    }

    /// Set the quantity of an existing line.
    ///
    /// # Returns
    ///
    /// Returns `false` if the user has no line for the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.cart_item SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.get())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        remove_many(self.pool, user_id, &[product_id]).await
    }

    /// Drop lines for products that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prune(
        &self,
        user_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<(), RepositoryError> {
        remove_many(self.pool, user_id, product_ids).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Replay `lines` into the stored cart in one transaction.
    ///
    /// Lines that would take a stored line past [`Quantity::MAX`] are left
    /// out and their products returned; every other line is applied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back and nothing is applied.
    pub async fn merge(
        &self,
        user_id: UserId,
        lines: &[CartEntry],
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let mut rejected = Vec::new();
        let mut tx = self.pool.begin().await?;
        for line in lines {
            if !upsert(&mut *tx, user_id, line.product_id, line.quantity).await? {
                rejected.push(line.product_id);
            }
        }
        tx.commit().await?;

        Ok(rejected)
    }
}

/// Insert a line or add to it. Returns `false` if the line is at a quantity
/// where the addition would exceed [`Quantity::MAX`].
async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
    product_id: ProductId,
    quantity: Quantity,
) -> Result<bool, RepositoryError> {
    let row = sqlx::query_scalar::<_, i32>(
        r"
        INSERT INTO storefront.cart_item (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_item.quantity + EXCLUDED.quantity
        WHERE cart_item.quantity + EXCLUDED.quantity <= $4
        RETURNING quantity
        ",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity.get())
    .bind(Quantity::MAX)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

async fn remove_many<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    if product_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1 AND product_id = ANY($2)")
        .bind(user_id)
        .bind(product_ids)
        .execute(executor)
        .await?;

    Ok(())
}
