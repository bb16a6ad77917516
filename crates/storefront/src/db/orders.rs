//! Order repository.

use sqlx::PgPool;
use sqlx::types::Json;

use marigold_core::{OrderId, OrderTotals, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderDetail, OrderItem, ShippingDetails};

const ORDER_COLUMNS: &str = "id, user_id, gateway_order_id, payment_id, payment_verified, \
     payment_method, shipping_method, shipping_address, amount_minor, currency, subtotal, tax, \
     shipping_cost, total, status, payment_status, created_at, updated_at";

/// Everything needed to record a freshly created order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub user_id: Option<UserId>,
    pub gateway_order_id: &'a str,
    pub shipping: &'a ShippingDetails,
    pub amount_minor: i64,
    pub currency: &'a str,
    pub totals: OrderTotals,
    pub items: &'a [OrderItem],
}

/// Repository for orders and their item snapshots.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order in `pending/pending` together with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("razorpayOrderId")` if the gateway
    /// order id was already recorded.
    pub async fn create(&self, new: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO storefront.order (user_id, gateway_order_id, payment_method, \
             shipping_method, shipping_address, amount_minor, currency, subtotal, tax, \
             shipping_cost, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(new.gateway_order_id)
        .bind(&new.shipping.payment_method)
        .bind(&new.shipping.shipping_method)
        .bind(Json(new.shipping))
        .bind(new.amount_minor)
        .bind(new.currency)
        .bind(new.totals.subtotal)
        .bind(new.totals.tax)
        .bind(new.totals.shipping_cost)
        .bind(new.totals.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "razorpayOrderId"))?;

        for item in new.items {
            sqlx::query(
                "INSERT INTO storefront.order_item (order_id, product_id, name, price, quantity, image) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.image.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Get an order owned by `user_id`, with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        if order.user_id != Some(user_id) {
            return Ok(None);
        }

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT product_id, name, price, quantity, image FROM storefront.order_item \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderDetail { order, items }))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Move an order to `processing/completed` and record the payment.
    ///
    /// The update only applies while the payment is not yet completed, so
    /// the transition happens at most once.
    ///
    /// # Returns
    ///
    /// Returns `None` if the order was already completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE storefront.order \
             SET payment_status = 'completed', status = 'processing', \
                 payment_verified = TRUE, payment_id = $2 \
             WHERE id = $1 AND payment_status <> 'completed' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(payment_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }
}
