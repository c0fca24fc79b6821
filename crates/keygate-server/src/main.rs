//! keygate Server Binary
//!
//! Runs the keygate HTTP gateway: credential management plus the
//! authenticated proxy to configured upstream integrations.

use std::env;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use keygate_auth::{ApiKeyRegistry, Authenticator, MemoryRecordStore, RecordStore, TokenStore};
use keygate_server::{create_router, AppState, ProxyGateway, ServerConfig};

#[tokio::main]
async fn main() {
    // Local .env, then the real environment
    dotenvy::dotenv().ok();

    // Initialize logging
    let log_level = env::var("KEYGATE_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = ServerConfig::from_env();

    // Record store: PostgreSQL when compiled in and configured, memory otherwise
    let store = record_store().await;

    // Token store: redis-durable when configured, with in-memory degradation
    let tokens = Arc::new(TokenStore::new(config.redis_url.as_deref()));
    if tokens.is_degraded() {
        info!("token store running in-memory; tokens will not survive restarts");
    }

    let keys = ApiKeyRegistry::new(store.clone());
    let authenticator = Authenticator::new(tokens, keys.clone(), store);

    // Upstream integrations from API_{NAME}_* variable families
    let registry = Arc::new(keygate_server::config::integrations_from_env());
    info!(integrations = ?registry.names(), "integrations loaded");

    let gateway = ProxyGateway::new(registry, config.upstream_timeout);

    let state = Arc::new(AppState {
        authenticator,
        keys,
        gateway,
    });

    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "keygate listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(feature = "postgres")]
async fn record_store() -> Arc<dyn RecordStore> {
    match env::var("KEYGATE_DATABASE_URL") {
        Ok(url) if !url.is_empty() => {
            let store = keygate_auth::PostgresRecordStore::connect(&url)
                .await
                .expect("Failed to connect to PostgreSQL record store");
            Arc::new(store)
        }
        _ => {
            info!("KEYGATE_DATABASE_URL not set; using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn record_store() -> Arc<dyn RecordStore> {
    Arc::new(MemoryRecordStore::new())
}
