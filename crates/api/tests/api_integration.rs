//! Integration tests for the API server.

use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId};
use domain::CartPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_state(store.clone(), CartPolicy::default());
    let app = api::create_app(state, get_metrics_handle(), Duration::from_secs(5));
    (app, store)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    user: Option<i64>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn add_item(
    app: &axum::Router,
    user: i64,
    product: ProductId,
    quantity: i32,
) -> (StatusCode, serde_json::Value) {
    send(
        app,
        "POST",
        "/cart/items",
        Some(user),
        Some(serde_json::json!({ "product_id": product, "quantity": quantity })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_cart_requires_identity() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let (status, _) = send(&app, "GET", "/cart", Some(0), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_cart_creates_empty_cart() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/cart", Some(1), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["cart_id"].is_i64());
    assert_eq!(json["lines"].as_array().unwrap().len(), 0);
    assert_eq!(json["total_cents"], 0);
}

#[tokio::test]
async fn test_add_item_reserves_stock() {
    let (app, store) = setup();
    let product = store
        .add_product("Widget", Money::from_cents(1250), 5)
        .await;

    let (status, json) = add_item(&app, 1, product, 2).await;

    assert_eq!(status, StatusCode::OK);
    let line = &json["lines"][0];
    assert_eq!(line["product_id"], product.as_i64());
    assert_eq!(line["name"], "Widget");
    assert_eq!(line["price_cents"], 1250);
    assert_eq!(line["quantity"], 2);
    assert_eq!(line["subtotal_cents"], 2500);
    assert_eq!(json["total_cents"], 2500);
    assert_eq!(store.stock_of(product).await, Some(3));
}

#[tokio::test]
async fn test_add_item_error_statuses() {
    let (app, store) = setup();
    let product = store.add_product("Widget", Money::from_cents(100), 2).await;

    let (status, _) = add_item(&app, 1, product, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = add_item(&app, 1, product, 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Insufficient stock")
    );

    let (status, _) = add_item(&app, 1, ProductId::new(999), 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_item() {
    let (app, store) = setup();
    let product = store.add_product("Widget", Money::from_cents(100), 5).await;
    let (_, cart) = add_item(&app, 1, product, 2).await;
    let line_id = cart["lines"][0]["line_id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/cart/items/{line_id}"),
        Some(2),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        "DELETE",
        &format!("/cart/items/{line_id}"),
        Some(1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lines"].as_array().unwrap().len(), 0);
    assert_eq!(store.stock_of(product).await, Some(5));
}

#[tokio::test]
async fn test_place_order_flow() {
    let (app, store) = setup();
    let mug = store.add_product("Mug", Money::from_cents(1000), 10).await;
    let spoon = store.add_product("Spoon", Money::from_cents(500), 10).await;
    add_item(&app, 1, mug, 2).await;
    add_item(&app, 1, spoon, 1).await;

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(1),
        Some(serde_json::json!({ "shipping_address": "1 Main St" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["shipping_address"], "1 Main St");
    assert_eq!(order["total_cents"], 2500);
    assert_eq!(order["lines"].as_array().unwrap().len(), 2);
    assert_eq!(order["lines"][0]["subtotal_cents"], 2000);
    assert!(order["created_at"].is_string());

    let (_, cart) = send(&app, "GET", "/cart", Some(1), None).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 0);

    let order_id = order["order_id"].as_i64().unwrap();
    let (status, loaded) = send(&app, "GET", &format!("/orders/{order_id}"), Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["total_cents"], 2500);

    let (status, _) = send(&app, "GET", &format!("/orders/{order_id}"), Some(2), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = send(&app, "GET", "/orders", Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_place_order_rejections() {
    let (app, store) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(1),
        Some(serde_json::json!({ "shipping_address": "1 Main St" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Cart is empty"));

    let product = store.add_product("Mug", Money::from_cents(1000), 10).await;
    add_item(&app, 1, product, 1).await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(1),
        Some(serde_json::json!({ "shipping_address": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Shipping address is required")
    );
    assert_eq!(store.order_count().await, 0);
}
