//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::notify::Notifier;
use crate::payments::GatewayClient;

/// How long the catalog category index may be served stale.
const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to shared
/// resources like the database pool and the injected external collaborators
/// (payment gateway, notifier).
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: GatewayClient,
    notifier: Notifier,
    categories: Cache<&'static str, Arc<Vec<String>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport is configured but invalid.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let gateway = GatewayClient::new(&config.payment);
        let notifier = Notifier::from_config(&config)?;
        let categories = Cache::builder()
            .max_capacity(1)
            .time_to_live(CATEGORY_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                notifier,
                categories,
            }),
        })
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

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    /// Get a reference to the notification sender.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// The catalog category index, cached briefly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the refresh query fails.
    pub async fn categories(&self) -> Result<Arc<Vec<String>>, crate::db::RepositoryError> {
        if let Some(cached) = self.inner.categories.get("all").await {
            return Ok(cached);
        }

        let fresh = Arc::new(
            crate::db::ProductRepository::new(self.pool())
                .categories()
                .await?,
        );
        self.inner.categories.insert("all", fresh.clone()).await;
        Ok(fresh)
    }

    /// Session/cookie signing secret bytes.
    #[must_use]
    pub fn signing_secret(&self) -> &[u8] {
        use secrecy::ExposeSecret;
        self.inner.config.session_secret.expose_secret().as_bytes()
    }
}
