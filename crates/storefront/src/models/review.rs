//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marigold_core::{ProductId, ReviewId, UserId};

/// A review joined with its author's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
