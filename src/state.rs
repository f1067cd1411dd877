use std::sync::Arc;

use crate::cliq::client::UpstreamApi;
use crate::cliq::token::TokenExchanger;
use crate::store::credentials::CredentialStore;
use crate::store::resources::ResourceStore;
use crate::store::tenants::TenantStore;

/// Shared collaborators for every request. Trait objects so the datastore
/// and the upstream can be swapped (Postgres vs in-memory, real vs scripted).
#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<dyn TenantStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub upstream: Arc<dyn UpstreamApi>,
    pub exchanger: Arc<dyn TokenExchanger>,
}
