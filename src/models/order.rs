//! Order records as they arrive on the order stream.
//!
//! Field names follow the wire format of the upstream producer. Every field is
//! `#[serde(default)]` and tolerates an explicit `null`, so an incomplete
//! record still deserializes and is rejected by the validator instead of by
//! the decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Reads `null` as the type's zero value.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// == Order ==
/// A single customer order, keyed by `order_uid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Unique order identifier (primary key)
    #[serde(deserialize_with = "null_default")]
    pub order_uid: String,
    /// Delivery tracking number
    #[serde(deserialize_with = "null_default")]
    pub track_number: String,
    /// Entry point the order came from
    #[serde(rename = "entry", deserialize_with = "null_default")]
    pub entry_point: String,
    /// Locale code, e.g. "en"
    #[serde(rename = "locale", deserialize_with = "null_default")]
    pub locale_code: String,
    #[serde(deserialize_with = "null_default")]
    pub internal_signature: String,
    #[serde(deserialize_with = "null_default")]
    pub customer_id: String,
    #[serde(deserialize_with = "null_default")]
    pub delivery_service: String,
    #[serde(rename = "shardkey", deserialize_with = "null_default")]
    pub shard_key: String,
    #[serde(rename = "sm_id", deserialize_with = "null_default")]
    pub state_machine_id: i64,
    /// Creation time, `None` when the producer left it out or sent `null`
    pub date_created: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_default")]
    pub oof_shard: String,
    #[serde(deserialize_with = "null_default")]
    pub delivery: Delivery,
    #[serde(deserialize_with = "null_default")]
    pub payment: Payment,
    #[serde(deserialize_with = "null_default")]
    pub items: Vec<OrderItem>,
}

// == Delivery ==
/// Recipient details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Owning order as echoed by the producer; informational only
    #[serde(deserialize_with = "null_default")]
    pub order_uid: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_default")]
    pub zip: String,
    #[serde(deserialize_with = "null_default")]
    pub city: String,
    #[serde(deserialize_with = "null_default")]
    pub address: String,
    #[serde(deserialize_with = "null_default")]
    pub region: String,
    #[serde(deserialize_with = "null_default")]
    pub email: String,
}

// == Payment ==
/// Payment details. Monetary fields are in the order currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    #[serde(rename = "transaction", deserialize_with = "null_default")]
    pub transaction_uid: String,
    #[serde(deserialize_with = "null_default")]
    pub request_id: String,
    #[serde(rename = "currency", deserialize_with = "null_default")]
    pub currency_code: String,
    #[serde(rename = "provider", deserialize_with = "null_default")]
    pub payment_provider: String,
    #[serde(rename = "amount", deserialize_with = "null_default")]
    pub amount_total: f64,
    /// Payment time as Unix seconds
    #[serde(rename = "payment_dt", deserialize_with = "null_default")]
    pub payment_date_time: i64,
    #[serde(rename = "bank", deserialize_with = "null_default")]
    pub bank_code: String,
    #[serde(deserialize_with = "null_default")]
    pub delivery_cost: f64,
    #[serde(deserialize_with = "null_default")]
    pub goods_total: f64,
    #[serde(deserialize_with = "null_default")]
    pub custom_fee: f64,
}

// == Order Item ==
/// One line of an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItem {
    #[serde(rename = "chrt_id", deserialize_with = "null_default")]
    pub chart_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub track_number: String,
    #[serde(rename = "price", deserialize_with = "null_default")]
    pub unit_price: f64,
    #[serde(deserialize_with = "null_default")]
    pub rid: String,
    #[serde(rename = "name", deserialize_with = "null_default")]
    pub product_name: String,
    /// Discount percentage, expected in [0, 100]
    #[serde(rename = "sale", deserialize_with = "null_default")]
    pub sale_percent: f64,
    #[serde(rename = "size", deserialize_with = "null_default")]
    pub size_code: String,
    #[serde(rename = "total_price", deserialize_with = "null_default")]
    pub line_total: f64,
    #[serde(rename = "nm_id", deserialize_with = "null_default")]
    pub product_id: i64,
    #[serde(rename = "brand", deserialize_with = "null_default")]
    pub brand_name: String,
    #[serde(rename = "status", deserialize_with = "null_default")]
    pub status_code: i32,
}
