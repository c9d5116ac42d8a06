//! API Routes
//!
//! Configures the Axum router for the order read API.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_orders_handler, delete_order_handler, get_all_orders_handler, get_order_handler,
    health_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /order/:order_uid` - Fetch one cached order
/// - `DELETE /order/:order_uid` - Evict one order from the cache
/// - `GET /orders` - List all cached orders
/// - `DELETE /delorders` - Clear the cache
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/order/:order_uid",
            get(get_order_handler).delete(delete_order_handler),
        )
        .route("/orders", get(get_all_orders_handler))
        .route("/delorders", delete(clear_orders_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
