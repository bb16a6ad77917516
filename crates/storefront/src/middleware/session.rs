//! Session middleware configuration.
//!
//! Sessions are stored in `tower_sessions.session` and carry the signed-in
//! user and, for guests, the guest cart.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "marigold_session";

/// Inactivity window before a session expires (7 days).
const SESSION_IDLE_DAYS: i64 = 7;

/// Create the session layer with `PostgreSQL` store.
///
/// The cookie is `Secure` only when the storefront is served over https.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::days(SESSION_IDLE_DAYS),
        ))
        .with_secure(config.base_url.starts_with("https://"))
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
