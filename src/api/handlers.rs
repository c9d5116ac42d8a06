//! API Handlers
//!
//! HTTP request handlers for the order read API. Handlers only ever talk to
//! the cache; the durable store is not consulted on reads.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::OrderCache;
use crate::error::{AppError, Result};
use crate::models::{HealthResponse, MessageResponse, Order, StatsResponse};

/// Longest order id accepted in a path.
pub const MAX_ORDER_UID_LENGTH: usize = 50;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn OrderCache>,
}

impl AppState {
    pub fn new(cache: Arc<dyn OrderCache>) -> Self {
        Self { cache }
    }
}

fn check_order_uid(order_uid: &str) -> Result<()> {
    // Byte length, so multi-byte ids hit the limit sooner
    if order_uid.len() > MAX_ORDER_UID_LENGTH {
        return Err(AppError::InvalidRequest(format!(
            "order_uid exceeds {} bytes",
            MAX_ORDER_UID_LENGTH
        )));
    }
    Ok(())
}

/// Handler for GET /order/:order_uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>> {
    check_order_uid(&order_uid)?;

    match state.cache.get_order(&order_uid).await? {
        Some(order) => Ok(Json(order)),
        None => {
            debug!(order_uid = %order_uid, "Order not in cache");
            Err(AppError::NotFound(order_uid))
        }
    }
}

/// Handler for DELETE /order/:order_uid
///
/// Removes the order from the cache only.
pub async fn delete_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<MessageResponse>> {
    check_order_uid(&order_uid)?;

    if !state.cache.order_exists(&order_uid).await? {
        return Err(AppError::NotFound(order_uid));
    }
    state.cache.remove_order(&order_uid).await?;

    Ok(Json(MessageResponse::order_deleted(&order_uid)))
}

/// Handler for GET /orders
pub async fn get_all_orders_handler(State(state): State<AppState>) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.cache.get_all_orders().await?))
}

/// Handler for DELETE /delorders
pub async fn clear_orders_handler(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.cache.clear().await?;
    Ok(Json(MessageResponse::orders_cleared()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.cache.stats().await?;
    Ok(Json(stats.into()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
