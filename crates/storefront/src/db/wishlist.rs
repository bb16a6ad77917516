//! Wishlist repository.

use sqlx::PgPool;

use marigold_core::{ProductId, UserId};

use super::RepositoryError;

/// Repository for a user's saved products.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Saved product ids, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            "SELECT product_id FROM storefront.wishlist_item WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }

    /// Save a product. Saving twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.wishlist_item (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove saved products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<(), RepositoryError> {
        if product_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "DELETE FROM storefront.wishlist_item WHERE user_id = $1 AND product_id = ANY($2)",
        )
        .bind(user_id)
        .bind(product_ids)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
