/**
 * Application State Management
 *
 * `AppState` is the central state container handed to the router. The
 * `FromRef` implementations let handlers extract exactly the service they
 * need (`State<Arc<SessionManager>>` and so on) without seeing the rest.
 *
 * # Thread Safety
 *
 * Every field is an `Arc` over an internally synchronized service; cloning
 * the state is cheap and handlers share the same underlying objects.
 */
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::backend::auth::manager::SessionManager;
use crate::backend::delivery::engine::DeliveryEngine;
use crate::backend::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    /// Session manager: register/login/refresh/logout/me
    pub sessions: Arc<SessionManager>,

    /// Connection gateway: presence, typing, fan-out
    pub gateway: Arc<Gateway>,

    /// Delivery engine: messages and status rows
    pub delivery: Arc<DeliveryEngine>,

    /// Database pool, `None` when running on in-memory stores
    pub db_pool: Option<PgPool>,
}

impl FromRef<AppState> for Arc<SessionManager> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<Gateway> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gateway.clone()
    }
}

impl FromRef<AppState> for Arc<DeliveryEngine> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.delivery.clone()
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
