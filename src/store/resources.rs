use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::StoreError;

/// The tenant-scoped resource families served by the action endpoint.
/// Each maps to its own table; every query on those tables carries a
/// `tenant_id` filter and every insert stamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Content,
    Playlist,
    EmergencyMessage,
    Setting,
}

impl ResourceKind {
    pub fn parse(resource: &str) -> Option<Self> {
        match resource {
            "content" => Some(ResourceKind::Content),
            "playlist" => Some(ResourceKind::Playlist),
            "emergency_message" => Some(ResourceKind::EmergencyMessage),
            "setting" => Some(ResourceKind::Setting),
            _ => None,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ResourceKind::Content => "content",
            ResourceKind::Playlist => "playlists",
            ResourceKind::EmergencyMessage => "emergency_messages",
            ResourceKind::Setting => "settings",
        }
    }

    /// Singular label for client-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Content => "content item",
            ResourceKind::Playlist => "playlist",
            ResourceKind::EmergencyMessage => "emergency message",
            ResourceKind::Setting => "setting",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>, StoreError>;

    async fn get(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<ResourceRecord>, StoreError>;

    async fn create(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        data: Value,
    ) -> Result<ResourceRecord, StoreError>;

    /// Replaces `data`; returns None when the row is absent or owned by
    /// another tenant.
    async fn update(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
        data: Value,
    ) -> Result<Option<ResourceRecord>, StoreError>;

    async fn delete(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<bool, StoreError>;
}

pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<ResourceRecord, StoreError> {
    Ok(ResourceRecord {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        data: row.try_get("data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const RECORD_COLUMNS: &str = "id, tenant_id, data, created_at, updated_at";

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn list(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE tenant_id = $1 ORDER BY created_at",
            RECORD_COLUMNS,
            kind.table()
        );
        let rows = sqlx::query(&sql).bind(tenant_id).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE tenant_id = $1 AND id = $2",
            RECORD_COLUMNS,
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn create(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        data: Value,
    ) -> Result<ResourceRecord, StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, data) VALUES ($1, $2, $3) RETURNING {}",
            kind.table(),
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(data)
            .fetch_one(&self.pool)
            .await?;
        record_from_row(&row)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
        data: Value,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        let sql = format!(
            "UPDATE {} SET data = $3, updated_at = now() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            kind.table(),
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(data)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND id = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_resources() {
        assert_eq!(ResourceKind::parse("playlist"), Some(ResourceKind::Playlist));
        assert_eq!(
            ResourceKind::parse("emergency_message"),
            Some(ResourceKind::EmergencyMessage)
        );
        assert_eq!(ResourceKind::parse("screens"), None);
    }
}
