//! Profile updates and the admin user console.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use shopfront_integration_tests::{TEST_PASSWORD, TestApp, order_body};

#[tokio::test]
async fn test_update_own_profile() {
    let app = TestApp::new();
    let ada = app.register("ada").await;

    let response = app
        .put(
            "/auth/profile",
            Some(&ada.token),
            json!({ "email": "Lovelace@Example.com", "password": "analytical engine" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["username"], "ada");
    assert_eq!(response.body["email"], "lovelace@example.com");
    assert!(response.body.get("passwordHash").is_none());

    // Old credentials stop working, new ones sign in
    let response = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let response = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "lovelace@example.com", "password": "analytical engine" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_cannot_take_another_email() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    app.register("bob").await;

    let response = app
        .put(
            "/auth/profile",
            Some(&ada.token),
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "User already exists");

    let response = app.put("/auth/profile", None, json!({ "username": "x" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_console_is_admin_only() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;

    let response = app.get("/auth", Some(&ada.token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .put(
            &format!("/auth/{}", bob.id),
            Some(&ada.token),
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.delete(&format!("/auth/{}", bob.id), Some(&ada.token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.delete("/auth/not-a-uuid", Some(&ada.token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Nothing changed
    let response = app.get("/auth/me", Some(&bob.token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["role"], "customer");
}

#[tokio::test]
async fn test_admin_lists_and_edits_users() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    app.register("bob").await;
    let admin = app.register_admin("root").await;

    let response = app.get("/auth", Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::OK);
    let users = response.body.as_array().unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[0]["username"], "ada");
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));

    let response = app
        .put(
            &format!("/auth/{}", ada.id),
            Some(&admin.token),
            json!({ "username": "countess", "role": "admin" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["username"], "countess");
    assert_eq!(response.body["email"], "ada@example.com");
    assert_eq!(response.body["role"], "admin");

    // The promoted account passes the admin check with its existing token
    let response = app.get("/orders", Some(&ada.token)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .put(
            &format!("/auth/{}", ada.id),
            Some(&admin.token),
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .put(
            "/auth/00000000-0000-4000-8000-000000000000",
            Some(&admin.token),
            json!({ "username": "ghost" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "User not found");
}

#[tokio::test]
async fn test_deleted_customer_orders_stay_readable() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let admin = app.register_admin("root").await;
    let lamp = app.seed_product("Lamp", 5_000).await;

    let response = app
        .post("/orders", Some(&ada.token), order_body(&[(&lamp, 1)]))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let order_id = response.body["id"].as_str().unwrap().to_string();

    let response = app.delete(&format!("/auth/{}", ada.id), Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "User deleted successfully");

    // The token no longer resolves to an account
    let response = app.get("/auth/me", Some(&ada.token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/orders", Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body[0]["id"], order_id.as_str());
    assert_eq!(response.body[0]["customer"]["username"], "Unknown user");

    let response = app
        .get(&format!("/order-history/{order_id}"), Some(&admin.token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body[0]["status"], "Pending");
    assert_eq!(response.body[0]["changedBy"]["username"], "Unknown user");

    let response = app.delete(&format!("/auth/{}", ada.id), Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new();
    let admin = app.register_admin("root").await;

    let response = app
        .delete(&format!("/auth/{}", admin.id), Some(&admin.token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Cannot delete your own account");

    let response = app.get("/auth/me", Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::OK);
}
