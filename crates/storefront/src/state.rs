//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::cart::CartLocks;
use crate::services::gateway::PaymentGateway;
use crate::services::storage::ObjectStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn ObjectStore>,
    cart_locks: CartLocks,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    /// * `gateway` - Payment gateway client
    /// * `store` - Object store for uploads
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                store,
                cart_locks: CartLocks::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get the object store used for uploads.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.inner.store.as_ref()
    }

    /// Get the per-user cart lock registry.
    #[must_use]
    pub fn cart_locks(&self) -> &CartLocks {
        &self.inner.cart_locks
    }
}
