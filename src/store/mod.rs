pub mod credentials;
pub mod manager;
pub mod memory;
pub mod resources;
pub mod tenants;

use thiserror::Error;

/// Errors from the datastore layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
