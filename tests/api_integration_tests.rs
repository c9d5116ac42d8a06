//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against an in-memory
//! order cache.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use order_cache::api::create_router;
use order_cache::cache::{InMemoryCache, OrderCache};
use order_cache::models::{Delivery, Order, OrderItem, Payment};
use order_cache::AppState;
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry_point: "WBIL".to_string(),
        delivery: Delivery {
            order_uid: order_uid.to_string(),
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction_uid: order_uid.to_string(),
            currency_code: "USD".to_string(),
            payment_provider: "wbpay".to_string(),
            amount_total: 1817.0,
            payment_date_time: 1637907727,
            bank_code: "alpha".to_string(),
            delivery_cost: 1500.0,
            goods_total: 317.0,
            ..Payment::default()
        },
        items: vec![OrderItem {
            chart_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            unit_price: 453.0,
            rid: "ab4219087a764ae0btest".to_string(),
            product_name: "Mascaras".to_string(),
            sale_percent: 30.0,
            size_code: "0".to_string(),
            line_total: 317.0,
            product_id: 2389212,
            brand_name: "Vivienne Sabo".to_string(),
            status_code: 202,
        }],
        locale_code: "en".to_string(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        state_machine_id: 99,
        date_created: Some(Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()),
        oof_shard: "1".to_string(),
        ..Order::default()
    }
}

async fn create_test_app(uids: &[&str]) -> (Router, Arc<InMemoryCache>) {
    let cache = Arc::new(InMemoryCache::new(100, Duration::from_secs(300)));
    for uid in uids {
        cache.save_order(&sample_order(uid)).await.unwrap();
    }
    (create_router(AppState::new(cache.clone())), cache)
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == GET /order/:order_uid ==

#[tokio::test]
async fn test_get_order_returns_wire_format() {
    let (app, _) = create_test_app(&["b563feb7b2b84b6test"]).await;

    let response = app
        .oneshot(request("GET", "/order/b563feb7b2b84b6test"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["order_uid"], "b563feb7b2b84b6test");
    assert_eq!(json["entry"], "WBIL");
    assert_eq!(json["shardkey"], "9");
    assert_eq!(json["delivery"]["email"], "test@gmail.com");
    assert_eq!(json["payment"]["transaction"], "b563feb7b2b84b6test");
    assert_eq!(json["items"][0]["chrt_id"], 9934930);
    assert_eq!(json["items"][0]["nm_id"], 2389212);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let (app, _) = create_test_app(&[]).await;

    let response = app.oneshot(request("GET", "/order/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "Order with UID 'missing' not found");
}

#[tokio::test]
async fn test_get_order_uid_too_long() {
    let (app, _) = create_test_app(&[]).await;
    let uri = format!("/order/{}", "x".repeat(51));

    let response = app.oneshot(request("GET", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("50"));
}

#[tokio::test]
async fn test_get_order_after_ttl_expired() {
    let cache = Arc::new(InMemoryCache::new(100, Duration::from_millis(100)));
    cache.save_order(&sample_order("short")).await.unwrap();
    let app = create_router(AppState::new(cache.clone()));

    tokio::time::sleep(Duration::from_millis(150)).await;

    let response = app.oneshot(request("GET", "/order/short")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_order_uid_limit_counts_bytes() {
    let (app, _) = create_test_app(&[]).await;
    // 26 characters, 52 bytes
    let uid = "é".repeat(26);
    let uri = format!("/order/{}", uid.replace('é', "%C3%A9"));

    let response = app.oneshot(request("GET", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == DELETE /order/:order_uid ==

#[tokio::test]
async fn test_delete_order() {
    let (app, cache) = create_test_app(&["order1"]).await;

    let response = app
        .clone()
        .oneshot(request("DELETE", "/order/order1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Order with UID 'order1' successfully deleted");
    assert!(!cache.order_exists("order1").await.unwrap());

    let response = app.oneshot(request("DELETE", "/order/order1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == GET /orders and DELETE /delorders ==

#[tokio::test]
async fn test_list_orders_most_recent_first() {
    let (app, _) = create_test_app(&["first", "second", "third"]).await;

    let response = app.oneshot(request("GET", "/orders")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let uids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["order_uid"].as_str().unwrap())
        .collect();
    assert_eq!(uids, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_list_orders_empty() {
    let (app, _) = create_test_app(&[]).await;

    let response = app.oneshot(request("GET", "/orders")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await, Value::Array(vec![]));
}

#[tokio::test]
async fn test_clear_orders() {
    let (app, cache) = create_test_app(&["a", "b"]).await;

    let response = app.oneshot(request("DELETE", "/delorders")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "All orders successfully cleared");
    assert!(cache.get_all_orders().await.unwrap().is_empty());
}

// == GET /stats and GET /health ==

#[tokio::test]
async fn test_stats_after_reads() {
    let (app, _) = create_test_app(&["a"]).await;

    app.clone().oneshot(request("GET", "/order/a")).await.unwrap();
    app.clone().oneshot(request("GET", "/order/zzz")).await.unwrap();

    let response = app.oneshot(request("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app(&[]).await;

    let response = app.oneshot(request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "order-cache");
    assert!(json.get("timestamp").is_some());
}
