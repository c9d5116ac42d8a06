//! Postgres order store
//!
//! One row per order: the id, its creation time and the whole record as
//! JSONB. Records are immutable once written.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::Json;
use tokio_postgres::NoTls;
use tracing::{debug, info};

use super::{OrderStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::Order;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS orders (
        order_uid    TEXT PRIMARY KEY,
        date_created TIMESTAMPTZ NOT NULL,
        payload      JSONB NOT NULL
    )";

const INSERT_ORDER: &str = "
    INSERT INTO orders (order_uid, date_created, payload)
    VALUES ($1, $2, $3)
    ON CONFLICT (order_uid) DO NOTHING";

const SELECT_ORDER: &str = "SELECT payload FROM orders WHERE order_uid = $1";

const SELECT_ALL: &str = "SELECT payload FROM orders ORDER BY date_created, order_uid";

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl DatabaseConfig {
    /// Creates a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Backend(format!("failed to create pool: {}", e)))
    }
}

// == Postgres Store ==
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: Pool,
}

impl PostgresOrderStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Creates the orders table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(backend)?;
        client.batch_execute(CREATE_TABLE).await.map_err(backend)?;
        info!("Order table ready");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(backend)?;
        let inserted = client
            .execute(
                INSERT_ORDER,
                &[&order.order_uid, &order.date_created, &Json(order)],
            )
            .await
            .map_err(backend)?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(order.order_uid.clone()));
        }
        debug!(order_uid = %order.order_uid, "Order persisted");
        Ok(())
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let client = self.pool.get().await.map_err(backend)?;
        let row = client
            .query_opt(SELECT_ORDER, &[&order_uid])
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let Json(order): Json<Order> = row.try_get(0).map_err(backend)?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let client = self.pool.get().await.map_err(backend)?;
        let rows = client.query(SELECT_ALL, &[]).await.map_err(backend)?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, Json<Order>>(0)
                    .map(|Json(order)| order)
                    .map_err(backend)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_from_default_config() {
        // Pool creation is lazy, no server is contacted
        let pool = DatabaseConfig::default().create_pool().unwrap();
        assert_eq!(pool.status().max_size, 16);
    }

    #[test]
    fn test_insert_ignores_conflicts() {
        assert!(INSERT_ORDER.contains("ON CONFLICT (order_uid) DO NOTHING"));
    }
}
