//! Domain records and API response models
//!
//! `order` holds the records carried on the order stream; `responses` holds
//! the DTOs returned by the read API.

pub mod order;
pub mod responses;

// Re-export commonly used types
pub use order::{Delivery, Order, OrderItem, Payment};
pub use responses::{ErrorResponse, HealthResponse, MessageResponse, StatsResponse};
