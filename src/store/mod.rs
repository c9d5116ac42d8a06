//! Durable Order Store
//!
//! The system of record for accepted orders. The cache is rebuilt from it at
//! startup, so every order the pipeline reports as stored lives here.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Order;

pub use memory::MemoryOrderStore;
pub use postgres::PostgresOrderStore;

/// Durable store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this id is already stored
    #[error("order {0} already exists")]
    Duplicate(String),

    /// Pool, connection, query or decoding failure
    #[error("store backend error: {0}")]
    Backend(String),
}

// == Order Store ==
/// Keyed, durable order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Existing ids fail with [`StoreError::Duplicate`].
    async fn put(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Every stored order, oldest `date_created` first.
    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;
}
