//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marigold_core::{Email, Role, UserId};

/// A storefront account.
///
/// The password hash lives in a separate table and is never loaded here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
