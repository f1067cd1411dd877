use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::credentials::{CredentialStore, IntegrationCredential};
use super::resources::{ResourceKind, ResourceRecord, ResourceStore};
use super::tenants::{Device, Tenant, TenantRole, TenantStore};
use super::StoreError;

/// In-memory implementation of every store trait. Backs the server when no
/// DATABASE_URL is configured (local development) and the integration tests.
#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<Vec<Tenant>>,
    devices: RwLock<Vec<(Device, String)>>,
    credentials: RwLock<HashMap<(Uuid, String), IntegrationCredential>>,
    resources: RwLock<HashMap<(Uuid, ResourceKind), Vec<ResourceRecord>>>,
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.iter().find(|t| t.display_name == name).cloned())
    }

    async fn create(
        &self,
        display_name: &str,
        secret_hash: &str,
        role: TenantRole,
    ) -> Result<Tenant, StoreError> {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            role,
            active: true,
            secret_hash: secret_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tenants.write().await.push(tenant.clone());
        Ok(tenant)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.tenants.read().await.len() as i64)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tenants = self.tenants.write().await;
        match tenants.iter_mut().find(|t| t.id == id) {
            Some(tenant) => {
                tenant.active = false;
                tenant.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_device_key(&self, key_hash: &str) -> Result<Option<Tenant>, StoreError> {
        let tenant_id = {
            let devices = self.devices.read().await;
            devices
                .iter()
                .find(|(_, hash)| hash == key_hash)
                .map(|(device, _)| device.tenant_id)
        };
        match tenant_id {
            Some(id) => TenantStore::get(self, id).await,
            None => Ok(None),
        }
    }

    async fn register_device(
        &self,
        tenant_id: Uuid,
        label: &str,
        key_hash: &str,
    ) -> Result<Device, StoreError> {
        let device = Device {
            id: Uuid::new_v4(),
            tenant_id,
            label: label.to_string(),
            created_at: Utc::now(),
        };
        self.devices
            .write()
            .await
            .push((device.clone(), key_hash.to_string()));
        Ok(device)
    }

    async fn list_devices(&self, tenant_id: Uuid) -> Result<Vec<Device>, StoreError> {
        let devices = self.devices.read().await;
        Ok(devices
            .iter()
            .filter(|(d, _)| d.tenant_id == tenant_id)
            .map(|(d, _)| d.clone())
            .collect())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(
        &self,
        tenant_id: Uuid,
        integration: &str,
    ) -> Result<Option<IntegrationCredential>, StoreError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.get(&(tenant_id, integration.to_string())).cloned())
    }

    async fn put(
        &self,
        tenant_id: Uuid,
        integration: &str,
        credential: &IntegrationCredential,
    ) -> Result<(), StoreError> {
        self.credentials
            .write()
            .await
            .insert((tenant_id, integration.to_string()), credential.clone());
        Ok(())
    }

    async fn rotate(
        &self,
        tenant_id: Uuid,
        integration: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut credentials = self.credentials.write().await;
        if let Some(credential) = credentials.get_mut(&(tenant_id, integration.to_string())) {
            credential.access_token = access_token.to_string();
            if let Some(refresh) = refresh_token {
                credential.refresh_token = Some(refresh.to_string());
            }
            credential.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources.get(&(tenant_id, kind)).cloned().unwrap_or_default())
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources
            .get(&(tenant_id, kind))
            .and_then(|records| records.iter().find(|r| r.id == id).cloned()))
    }

    async fn create(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        data: Value,
    ) -> Result<ResourceRecord, StoreError> {
        let now = Utc::now();
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            tenant_id,
            data,
            created_at: now,
            updated_at: now,
        };
        self.resources
            .write()
            .await
            .entry((tenant_id, kind))
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
        data: Value,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        let mut resources = self.resources.write().await;
        let record = resources
            .get_mut(&(tenant_id, kind))
            .and_then(|records| records.iter_mut().find(|r| r.id == id));
        match record {
            Some(record) => {
                record.data = data;
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut resources = self.resources.write().await;
        match resources.get_mut(&(tenant_id, kind)) {
            Some(records) => {
                let before = records.len();
                records.retain(|r| r.id != id);
                Ok(records.len() < before)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_put_then_get_round_trips() {
        let store = MemoryStore::default();
        let tenant_id = Uuid::new_v4();

        for channel_ids in [vec![], vec!["ch-1".to_string(), "ch-2".to_string()]] {
            let credential = IntegrationCredential {
                access_token: "access-1".into(),
                refresh_token: Some("refresh-1".into()),
                channel_ids,
                updated_at: Utc::now(),
            };
            CredentialStore::put(&store, tenant_id, "cliq", &credential)
                .await
                .unwrap();
            let stored = CredentialStore::get(&store, tenant_id, "cliq")
                .await
                .unwrap()
                .expect("credential stored");
            assert_eq!(stored, credential);
        }
    }

    #[tokio::test]
    async fn get_missing_credential_is_absent_not_error() {
        let store = MemoryStore::default();
        let result = CredentialStore::get(&store, Uuid::new_v4(), "cliq").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn rotate_preserves_refresh_token_unless_replaced() {
        let store = MemoryStore::default();
        let tenant_id = Uuid::new_v4();
        let credential = IntegrationCredential {
            access_token: "old-access".into(),
            refresh_token: Some("old-refresh".into()),
            channel_ids: vec![],
            updated_at: Utc::now(),
        };
        CredentialStore::put(&store, tenant_id, "cliq", &credential)
            .await
            .unwrap();

        // No new refresh token: stored one stays
        store.rotate(tenant_id, "cliq", "new-access", None).await.unwrap();
        let stored = CredentialStore::get(&store, tenant_id, "cliq")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "new-access");
        assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));

        // New refresh token: replaced
        store
            .rotate(tenant_id, "cliq", "newer-access", Some("new-refresh"))
            .await
            .unwrap();
        let stored = CredentialStore::get(&store, tenant_id, "cliq")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "newer-access");
        assert_eq!(stored.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[tokio::test]
    async fn resources_are_tenant_scoped() {
        let store = MemoryStore::default();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        let record =
            ResourceStore::create(&store, t1, ResourceKind::Playlist, serde_json::json!({"name": "lobby"}))
                .await
                .unwrap();

        let t2_list = store.list(t2, ResourceKind::Playlist).await.unwrap();
        assert!(t2_list.is_empty());
        let t2_get = ResourceStore::get(&store, t2, ResourceKind::Playlist, record.id)
            .await
            .unwrap();
        assert!(t2_get.is_none());

        let t1_list = store.list(t1, ResourceKind::Playlist).await.unwrap();
        assert_eq!(t1_list.len(), 1);
    }
}
