//! API Module
//!
//! HTTP handlers and routing for the order read API.
//!
//! # Endpoints
//! - `GET /order/:order_uid` - Fetch one cached order
//! - `DELETE /order/:order_uid` - Evict one order from the cache
//! - `GET /orders` - List all cached orders
//! - `DELETE /delorders` - Clear the cache
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
