/**
 * Router Configuration
 *
 * Assembles the full Axum router: public auth routes, protected auth and
 * message routes behind the access-token middleware, the WebSocket
 * endpoint, and a health probe.
 *
 * # Route Order
 *
 * The WebSocket endpoint sits outside the bearer middleware because its
 * token arrives in the query string and is verified in the handshake
 * handler itself. Everything under the protected group shares one
 * middleware instance.
 */
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower_http::trace::TraceLayer;

use crate::backend::gateway::socket::ws_handler;
use crate::backend::middleware::auth::auth_middleware;
use crate::backend::routes::auth_routes::{protected_auth_routes, public_auth_routes};
use crate::backend::routes::message_routes::message_routes;
use crate::backend::server::state::AppState;
use crate::shared::dto::ApiResponse;

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(serde_json::json!({ "healthy": true })))
}

/// Create the Axum router with all routes configured.
pub fn create_router(app_state: AppState) -> Router {
    let protected = protected_auth_routes()
        .merge(message_routes())
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .merge(public_auth_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
