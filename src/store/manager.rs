use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::StoreError;

/// Lazily-created shared connection pool for the signage database.
pub struct DatabaseManager {
    pool: Arc<RwLock<Option<PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pool: Arc::new(RwLock::new(None)),
        })
    }

    /// Whether a database is configured at all. When it is not, the server
    /// falls back to in-memory storage (local development only).
    pub fn database_configured() -> bool {
        std::env::var("DATABASE_URL").is_ok()
    }

    /// Get the shared pool, creating it on first use
    pub async fn pool() -> Result<PgPool, StoreError> {
        let manager = Self::instance();

        // Fast path: try read lock
        {
            let pool = manager.pool.read().await;
            if let Some(pool) = pool.as_ref() {
                return Ok(pool.clone());
            }
        }

        let connection_string = Self::connection_string()?;
        let pool = PgPoolOptions::new().connect(&connection_string).await?;

        {
            let mut slot = manager.pool.write().await;
            *slot = Some(pool.clone());
        }

        info!("Created database pool");
        Ok(pool)
    }

    fn connection_string() -> Result<String, StoreError> {
        let raw = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;

        // Parse up front so a bad URL fails at startup, not mid-request
        let url = url::Url::parse(&raw).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        Ok(url.into())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close() {
        let manager = Self::instance();
        let mut slot = manager.pool.write().await;
        if let Some(pool) = slot.take() {
            pool.close().await;
            info!("Closed database pool");
        }
    }
}
