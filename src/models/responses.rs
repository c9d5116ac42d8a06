//! Response DTOs for the order read API
//!
//! Defines the structure of outgoing HTTP response bodies. Orders themselves
//! are serialized directly from [`Order`](super::Order).

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for mutating operations (DELETE /order/:uid, DELETE /delorders)
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Human readable outcome
    pub message: String,
}

impl MessageResponse {
    /// Creates the response for a single deleted order
    pub fn order_deleted(order_uid: &str) -> Self {
        Self {
            message: format!("Order with UID '{}' successfully deleted", order_uid),
        }
    }

    /// Creates the response for a cleared cache
    pub fn orders_cleared() -> Self {
        Self {
            message: "All orders successfully cleared".to_string(),
        }
    }
}

/// Body of GET /stats: the cache counters plus the derived hit rate.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(counters: CacheStats) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: String,
    /// Service name
    pub service: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            service: "order-cache".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `{"error": ...}` body used by every failing request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
