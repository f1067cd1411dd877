use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Admin,
    User,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Admin => "admin",
            TenantRole::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(TenantRole::Admin),
            "user" => Some(TenantRole::User),
            _ => None,
        }
    }
}

/// The acting principal. Never deleted, only deactivated.
#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub display_name: String,
    pub role: TenantRole,
    pub active: bool,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pre-authorized playback client bound to one tenant. Only the sha-256
/// of its key is stored; the plaintext key is shown once at registration.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Hash a login secret or device key for storage/lookup
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Connectivity probe for the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError>;

    async fn create(
        &self,
        display_name: &str,
        secret_hash: &str,
        role: TenantRole,
    ) -> Result<Tenant, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Resolve a device key hash to its owning tenant
    async fn find_by_device_key(&self, key_hash: &str) -> Result<Option<Tenant>, StoreError>;

    async fn register_device(
        &self,
        tenant_id: Uuid,
        label: &str,
        key_hash: &str,
    ) -> Result<Device, StoreError>;

    async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<Device>, StoreError>;
}

pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TENANT_COLUMNS: &str =
    "id, display_name, role, active, secret_hash, created_at, updated_at";

fn tenant_from_row(row: &PgRow) -> Result<Tenant, StoreError> {
    let role_text: String = row.try_get("role")?;
    let role = TenantRole::parse(&role_text)
        .ok_or_else(|| StoreError::QueryError(format!("unknown tenant role '{}'", role_text)))?;

    Ok(Tenant {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        role,
        active: row.try_get("active")?,
        secret_hash: row.try_get("secret_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn device_from_row(row: &PgRow) -> Result<Device, StoreError> {
    Ok(Device {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        label: row.try_get("label")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let sql = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE display_name = $1",
            TENANT_COLUMNS
        );
        let row = sqlx::query(&sql).bind(name).fetch_optional(&self.pool).await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn create(
        &self,
        display_name: &str,
        secret_hash: &str,
        role: TenantRole,
    ) -> Result<Tenant, StoreError> {
        let sql = format!(
            "INSERT INTO tenants (id, display_name, role, active, secret_hash) \
             VALUES ($1, $2, $3, true, $4) RETURNING {}",
            TENANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(display_name)
            .bind(role.as_str())
            .bind(secret_hash)
            .fetch_one(&self.pool)
            .await?;
        tenant_from_row(&row)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tenants")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tenants SET active = false, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_device_key(&self, key_hash: &str) -> Result<Option<Tenant>, StoreError> {
        let sql = "SELECT t.id, t.display_name, t.role, t.active, t.secret_hash, \
                   t.created_at, t.updated_at \
                   FROM tenants t JOIN devices d ON d.tenant_id = t.id WHERE d.key_hash = $1";
        let row = sqlx::query(sql)
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn register_device(
        &self,
        tenant_id: Uuid,
        label: &str,
        key_hash: &str,
    ) -> Result<Device, StoreError> {
        let row = sqlx::query(
            "INSERT INTO devices (id, tenant_id, label, key_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, tenant_id, label, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(label)
        .bind(key_hash)
        .fetch_one(&self.pool)
        .await?;
        device_from_row(&row)
    }

    async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<Device>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, label, created_at FROM devices \
             WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(device_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_distinct() {
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
        // hex-encoded sha-256
        assert_eq!(hash_secret("abc").len(), 64);
    }

    #[test]
    fn role_round_trips() {
        assert_eq!(TenantRole::parse("admin"), Some(TenantRole::Admin));
        assert_eq!(TenantRole::parse(TenantRole::User.as_str()), Some(TenantRole::User));
        assert_eq!(TenantRole::parse("superuser"), None);
    }
}
