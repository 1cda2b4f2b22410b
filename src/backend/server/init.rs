/**
 * Server Initialization
 *
 * Builds the application: configuration, store selection (PostgreSQL when
 * `DATABASE_URL` is configured, in-memory otherwise), service wiring, and
 * router creation.
 */
use axum::Router;
use std::sync::Arc;

use crate::backend::auth::manager::SessionManager;
use crate::backend::auth::postgres::PgCredentialStore;
use crate::backend::auth::store::{CredentialStore, MemoryCredentialStore};
use crate::backend::delivery::engine::DeliveryEngine;
use crate::backend::delivery::postgres::PgMessageStore;
use crate::backend::delivery::store::{MemoryMessageStore, MessageStore};
use crate::backend::gateway::Gateway;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::AppState;

/// Create and configure the Axum application from the environment.
///
/// Resilient by design: a missing or unreachable database downgrades to
/// in-memory stores instead of aborting startup.
pub async fn create_app() -> Router {
    tracing::info!("Initializing veilchat backend server");

    let config = ServerConfig::from_env();
    let db_pool = load_database().await;

    let (credentials, messages): (Arc<dyn CredentialStore>, Arc<dyn MessageStore>) =
        match &db_pool {
            Some(pool) => (
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgMessageStore::new(pool.clone())),
            ),
            None => (
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryMessageStore::new()),
            ),
        };

    let app = create_app_with_stores(config, credentials, messages, db_pool);
    tracing::info!("Router configured");
    app
}

/// Wire the services over explicit stores. Used by `create_app` and by the
/// integration tests, which pass in-memory stores.
pub fn create_app_with_stores(
    config: ServerConfig,
    credentials: Arc<dyn CredentialStore>,
    messages: Arc<dyn MessageStore>,
    db_pool: Option<sqlx::PgPool>,
) -> Router {
    let sessions = Arc::new(SessionManager::new(
        credentials.clone(),
        config.jwt_secret,
        config.access_ttl_secs,
        config.refresh_ttl_secs,
        config.totp_key,
    ));
    let delivery = Arc::new(DeliveryEngine::new(messages));
    let gateway = Arc::new(Gateway::new(credentials, delivery.clone()));

    create_router(AppState {
        sessions,
        gateway,
        delivery,
        db_pool,
    })
}
