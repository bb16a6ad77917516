//! Product review repository.

use sqlx::PgPool;

use marigold_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::Review;

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first, with author names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name, r.rating, r.comment,
                   r.created_at
            FROM storefront.product_review r
            JOIN storefront.user u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// Add a review and refresh the product's `rating` and `review_count`
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict("review")` if the user already
    /// reviewed this product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i32,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Held until commit so concurrent reviews serialize on the aggregate.
        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM storefront.product WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let review = sqlx::query_as::<_, Review>(
            r"
            WITH inserted AS (
                INSERT INTO storefront.product_review (product_id, user_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING id, product_id, user_id, rating, comment, created_at
            )
            SELECT i.id, i.product_id, i.user_id, u.name AS user_name, i.rating, i.comment,
                   i.created_at
            FROM inserted i
            JOIN storefront.user u ON u.id = i.user_id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "review"))?;

        sqlx::query(
            r"
            UPDATE storefront.product p
            SET rating = agg.avg_rating, review_count = agg.total
            FROM (
                SELECT COALESCE(ROUND(AVG(rating)::numeric, 2), 0) AS avg_rating,
                       COUNT(*)::int AS total
                FROM storefront.product_review
                WHERE product_id = $1
            ) agg
            WHERE p.id = $1
            ",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(review)
    }
}
