pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable holding the storefront connection string.
pub const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// The connection string was not set.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: {DATABASE_URL_VAR}")]
pub struct MissingDatabaseUrl;

/// Read the storefront connection string, loading `.env` first.
///
/// # Errors
///
/// Returns `MissingDatabaseUrl` if the variable is unset.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();
    std::env::var(DATABASE_URL_VAR)
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect to the storefront database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection fails.
pub async fn connect(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Connecting to storefront database...");
    marigold_storefront::db::create_pool(database_url).await
}
