//! Checkout: price verification, atomic order creation, cart clearing.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use shopfront_core::Price;
use shopfront_integration_tests::{TestApp, cart_item, order_body};
use shopfront_server::db::CatalogRepository;

#[tokio::test]
async fn test_place_order_from_cart() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let admin = app.register_admin("root").await;
    let lamp = app.seed_product("Lamp", 10_000).await;
    let desk = app.seed_product("Desk", 5_000).await;

    app.post("/cart", Some(&ada.token), cart_item(&lamp, None))
        .await;
    let cart = app
        .post("/cart", Some(&ada.token), cart_item(&desk, None))
        .await;
    let subtotal: f64 = cart
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["price"].as_f64().unwrap())
        .sum();
    assert_eq!(cart.body.as_array().unwrap().len(), 2);
    assert!((subtotal - 150.0).abs() < f64::EPSILON);

    let response = app
        .post(
            "/orders",
            Some(&ada.token),
            order_body(&[(&lamp, 1), (&desk, 1)]),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["status"], "Pending");
    assert_eq!(response.body["total"].as_f64().unwrap(), 150.0);
    assert_eq!(response.body["userId"], ada.id.as_str());
    assert_eq!(response.body["items"][0]["productName"], "Lamp");
    assert_eq!(response.body["items"][1]["qty"], 1);

    // Cart is cleared after checkout
    let cart = app.get("/cart", Some(&ada.token)).await;
    assert_eq!(cart.body, json!([]));

    // Exactly one history entry, Pending, by the customer
    let order_id = response.body["id"].as_str().unwrap();
    let history = app
        .get(&format!("/order-history/{order_id}"), Some(&admin.token))
        .await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "Pending");
    assert_eq!(entries[0]["changedBy"]["username"], "ada");
}

#[tokio::test]
async fn test_quantities_multiply_line_totals() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let mug = app.seed_product("Mug", 1_250).await;

    let response = app
        .post("/orders", Some(&ada.token), order_body(&[(&mug, 3)]))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["total"].as_f64().unwrap(), 37.5);
}

#[tokio::test]
async fn test_empty_cart_creates_nothing() {
    let app = TestApp::new();
    let ada = app.register("ada").await;

    let response = app
        .post("/orders", Some(&ada.token), json!({ "items": [], "total": 0 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Cart is empty");

    let orders = app
        .get(&format!("/orders/user/{}", ada.id), Some(&ada.token))
        .await;
    assert_eq!(orders.body, json!([]));
}

#[tokio::test]
async fn test_tampered_price_is_rejected() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let lamp = app.seed_product("Lamp", 5_000).await;

    let body = json!({
        "items": [{ "productId": lamp.id, "qty": 1, "price": 1.0 }],
        "total": 1.0,
    });
    let response = app.post("/orders", Some(&ada.token), body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let orders = app
        .get(&format!("/orders/user/{}", ada.id), Some(&ada.token))
        .await;
    assert_eq!(orders.body, json!([]));
}

#[tokio::test]
async fn test_wrong_total_is_rejected() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let lamp = app.seed_product("Lamp", 5_000).await;

    let mut body = order_body(&[(&lamp, 2)]);
    body["total"] = json!(50.0);
    let response = app.post("/orders", Some(&ada.token), body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_keeps_price_after_catalog_change() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let mut lamp = app.seed_product("Lamp", 5_000).await;

    let response = app
        .post("/orders", Some(&ada.token), order_body(&[(&lamp, 1)]))
        .await;
    let order_id = response.body["id"].as_str().unwrap().to_string();

    lamp.price = Price::from_cents(9_900);
    app.store.upsert(&lamp).await.unwrap();

    let response = app
        .get(&format!("/orders/{order_id}"), Some(&ada.token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"].as_f64().unwrap(), 50.0);
    assert_eq!(response.body["items"][0]["price"].as_f64().unwrap(), 50.0);
}

#[tokio::test]
async fn test_checkout_requires_token() {
    let app = TestApp::new();
    let lamp = app.seed_product("Lamp", 5_000).await;

    let response = app.post("/orders", None, order_body(&[(&lamp, 1)])).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
