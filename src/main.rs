use std::sync::Arc;

use signage_api::cliq::client::CliqClient;
use signage_api::cliq::token::CliqTokenExchanger;
use signage_api::config;
use signage_api::routes;
use signage_api::state::AppState;
use signage_api::store::credentials::PgCredentialStore;
use signage_api::store::manager::DatabaseManager;
use signage_api::store::memory::MemoryStore;
use signage_api::store::resources::PgResourceStore;
use signage_api::store::tenants::PgTenantStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, secrets, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting signage API in {:?} mode", config.environment);

    let state = build_state().await?;
    let app = routes::app(state);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("signage API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state() -> anyhow::Result<AppState> {
    let integration = &config::config().integration;
    let upstream = Arc::new(CliqClient::new(
        integration.api_base_url.clone(),
        integration.http_timeout(),
    )?);
    let exchanger = Arc::new(CliqTokenExchanger::from_config(integration)?);

    if DatabaseManager::database_configured() {
        let pool = DatabaseManager::pool().await?;
        Ok(AppState {
            tenants: Arc::new(PgTenantStore::new(pool.clone())),
            credentials: Arc::new(PgCredentialStore::new(pool.clone())),
            resources: Arc::new(PgResourceStore::new(pool)),
            upstream,
            exchanger,
        })
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory storage (data is not persisted)");
        let memory = Arc::new(MemoryStore::default());
        Ok(AppState {
            tenants: memory.clone(),
            credentials: memory.clone(),
            resources: memory,
            upstream,
            exchanger,
        })
    }
}
