use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::StoreError;

/// One integration credential per `(tenant_id, integration)` pair.
/// Tokens are opaque secrets; they never appear in API responses or logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub channel_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Absent means "integration not configured" - an expected state,
    /// not an error.
    async fn get(
        &self,
        tenant_id: Uuid,
        integration: &str,
    ) -> Result<Option<IntegrationCredential>, StoreError>;

    /// Upsert; never duplicates a `(tenant_id, integration)` row.
    async fn put(
        &self,
        tenant_id: Uuid,
        integration: &str,
        credential: &IntegrationCredential,
    ) -> Result<(), StoreError>;

    /// Always replaces the access token; replaces the refresh token only
    /// when the refresh flow supplied a new one.
    async fn rotate(
        &self,
        tenant_id: Uuid,
        integration: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn credential_from_row(row: &PgRow) -> Result<IntegrationCredential, StoreError> {
    Ok(IntegrationCredential {
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        channel_ids: row.try_get("channel_ids")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get(
        &self,
        tenant_id: Uuid,
        integration: &str,
    ) -> Result<Option<IntegrationCredential>, StoreError> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, channel_ids, updated_at \
             FROM integration_credentials WHERE tenant_id = $1 AND integration = $2",
        )
        .bind(tenant_id)
        .bind(integration)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn put(
        &self,
        tenant_id: Uuid,
        integration: &str,
        credential: &IntegrationCredential,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO integration_credentials \
             (tenant_id, integration, access_token, refresh_token, channel_ids, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (tenant_id, integration) DO UPDATE SET \
               access_token = EXCLUDED.access_token, \
               refresh_token = EXCLUDED.refresh_token, \
               channel_ids = EXCLUDED.channel_ids, \
               updated_at = now()",
        )
        .bind(tenant_id)
        .bind(integration)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(&credential.channel_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate(
        &self,
        tenant_id: Uuid,
        integration: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        // COALESCE keeps the stored refresh token when the exchange reused it
        sqlx::query(
            "UPDATE integration_credentials SET \
               access_token = $3, \
               refresh_token = COALESCE($4, refresh_token), \
               updated_at = now() \
             WHERE tenant_id = $1 AND integration = $2",
        )
        .bind(tenant_id)
        .bind(integration)
        .bind(access_token)
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
