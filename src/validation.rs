//! Order validation
//!
//! Pure checks over an [`Order`]. A record is either entirely valid or
//! rejected with the first failing field; nothing is mutated.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{Delivery, Order, OrderItem, Payment};

/// Strict ASCII email pattern, matched against the lowercased address.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Reason an order failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(String),

    #[error("{0} has an invalid format")]
    InvalidFormat(String),

    #[error("{0} is out of range")]
    OutOfRange(String),

    #[error("order has no items")]
    NoItems,
}

// == Order Validator ==
/// Stateless order validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator;

impl OrderValidator {
    pub fn new() -> Self {
        Self
    }

    /// Returns true when every check passes.
    pub fn validate(&self, order: &Order) -> bool {
        self.check(order).is_ok()
    }

    /// Runs every check and reports the first failure.
    pub fn check(&self, order: &Order) -> Result<(), ValidationError> {
        check_required_fields(order)?;
        check_delivery(&order.delivery)?;
        check_payment(&order.payment)?;
        check_items(&order.items)?;
        check_date(order.date_created.as_ref())
    }
}

fn require(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::Empty(field.to_string()))
    } else {
        Ok(())
    }
}

fn non_negative(value: f64, field: &str) -> Result<(), ValidationError> {
    // NaN fails this comparison too
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange(field.to_string()))
    }
}

fn check_required_fields(order: &Order) -> Result<(), ValidationError> {
    require(&order.order_uid, "order_uid")?;
    require(&order.track_number, "track_number")?;
    require(&order.entry_point, "entry")?;
    require(&order.locale_code, "locale")?;
    require(&order.customer_id, "customer_id")?;
    require(&order.delivery_service, "delivery_service")?;
    require(&order.shard_key, "shardkey")?;
    require(&order.oof_shard, "oof_shard")
}

fn check_delivery(delivery: &Delivery) -> Result<(), ValidationError> {
    require(&delivery.name, "delivery.name")?;
    require(&delivery.phone, "delivery.phone")?;
    require(&delivery.zip, "delivery.zip")?;
    require(&delivery.city, "delivery.city")?;
    require(&delivery.address, "delivery.address")?;
    require(&delivery.region, "delivery.region")?;
    require(&delivery.email, "delivery.email")?;

    if !is_valid_email(&delivery.email) {
        return Err(ValidationError::InvalidFormat("delivery.email".to_string()));
    }
    Ok(())
}

/// Case-insensitive email format check.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_REGEX.is_match(&email.to_lowercase())
}

fn check_payment(payment: &Payment) -> Result<(), ValidationError> {
    require(&payment.transaction_uid, "payment.transaction")?;
    require(&payment.currency_code, "payment.currency")?;
    require(&payment.payment_provider, "payment.provider")?;
    require(&payment.bank_code, "payment.bank")?;
    non_negative(payment.amount_total, "payment.amount")?;
    non_negative(payment.delivery_cost, "payment.delivery_cost")?;
    non_negative(payment.goods_total, "payment.goods_total")?;
    non_negative(payment.custom_fee, "payment.custom_fee")
}

fn check_items(items: &[OrderItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    items
        .iter()
        .enumerate()
        .try_for_each(|(index, item)| check_item(index, item))
}

fn check_item(index: usize, item: &OrderItem) -> Result<(), ValidationError> {
    let field = |name: &str| format!("items[{}].{}", index, name);

    if item.chart_id <= 0 {
        return Err(ValidationError::OutOfRange(field("chrt_id")));
    }
    if item.product_id <= 0 {
        return Err(ValidationError::OutOfRange(field("nm_id")));
    }
    require(&item.track_number, &field("track_number"))?;
    require(&item.rid, &field("rid"))?;
    require(&item.product_name, &field("name"))?;
    require(&item.size_code, &field("size"))?;
    require(&item.brand_name, &field("brand"))?;
    non_negative(item.unit_price, &field("price"))?;
    non_negative(item.line_total, &field("total_price"))?;

    if !(0.0..=100.0).contains(&item.sale_percent) {
        return Err(ValidationError::OutOfRange(field("sale")));
    }
    Ok(())
}

/// Upstream producers encode an unset time as 0001-01-01T00:00:00Z.
static ZERO_TIME: Lazy<Option<DateTime<Utc>>> =
    Lazy::new(|| Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single());

fn check_date(date: Option<&DateTime<Utc>>) -> Result<(), ValidationError> {
    match date {
        Some(date) if Some(*date) != *ZERO_TIME => Ok(()),
        _ => Err(ValidationError::Empty("date_created".to_string())),
    }
}
