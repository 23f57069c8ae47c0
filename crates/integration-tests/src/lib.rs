//! Test harness for the Shopfront API.
//!
//! [`TestApp`] builds the real router over a fresh in-memory store and sends
//! requests through it with `tower::ServiceExt::oneshot`, so no socket or
//! database is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use shopfront_core::{Price, ProductId, UserRole};
use shopfront_server::config::ServerConfig;
use shopfront_server::db::{CatalogRepository, MemoryStore, Store};
use shopfront_server::models::Product;
use shopfront_server::services::AuthService;
use shopfront_server::state::AppState;

/// Token secret used by every test app.
pub const TEST_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "correct horse battery";

/// A response, with the body parsed as JSON when possible.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
}

/// The API wired to an in-memory store.
pub struct TestApp {
    router: Router,
    pub store: MemoryStore,
    next_ip: AtomicU32,
}

impl TestApp {
    /// Fresh app with an empty store.
    #[must_use]
    pub fn new() -> Self {
        let vars = HashMap::from([
            ("SHOPFRONT_STORAGE".to_string(), "memory".to_string()),
            ("SHOPFRONT_TOKEN_SECRET".to_string(), TEST_SECRET.to_string()),
        ]);
        let config = ServerConfig::from_map(&vars).unwrap();
        let store = MemoryStore::new();
        let state = AppState::new(config, Store::memory(&store));

        Self {
            router: shopfront_server::app(state),
            store,
            next_ip: AtomicU32::new(1),
        }
    }

    /// Distinct client address per call, so auth rate limits stay out of the way.
    fn fresh_ip(&self) -> String {
        let n = self.next_ip.fetch_add(1, Ordering::Relaxed);
        let [_, b, c, d] = n.to_be_bytes();
        format!("10.{b}.{c}.{d}")
    }

    /// Send a request from a fresh client address.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let ip = self.fresh_ip();
        self.request_from(&ip, method, uri, token, body).await
    }

    /// Send a request from a given client address.
    pub async fn request_from(
        &self,
        ip: &str,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register a customer through the API.
    pub async fn register(&self, username: &str) -> TestUser {
        let response = self
            .post(
                "/auth/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": TEST_PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        TestUser {
            id: response.body["user"]["id"].as_str().unwrap().to_string(),
            token: response.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Register an account and grant it the admin role.
    pub async fn register_admin(&self, username: &str) -> TestUser {
        let user = self.register(username).await;
        AuthService::new(Arc::new(self.store.clone()))
            .set_role(&format!("{username}@example.com"), UserRole::Admin)
            .await
            .unwrap();
        user
    }

    /// Put a product in the catalog.
    pub async fn seed_product(&self, name: &str, cents: u32) -> Product {
        let product = Product {
            id: ProductId::generate(),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image: format!("/images/{}.jpg", name.to_lowercase()),
            category: None,
            description: None,
        };
        self.store.upsert(&product).await.unwrap();
        product
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// `POST /cart` body for a catalog product.
#[must_use]
pub fn cart_item(product: &Product, cart_id: Option<&str>) -> Value {
    let mut body = serde_json::json!({
        "productId": product.id,
        "name": product.name,
        "price": product.price,
        "image": product.image,
    });
    if let Some(id) = cart_id {
        body["cartId"] = Value::from(id);
    }
    body
}

/// `POST /orders` body for `(product, qty)` lines at catalog prices.
#[must_use]
pub fn order_body(lines: &[(&Product, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product, qty)| {
            serde_json::json!({
                "productId": product.id,
                "qty": qty,
                "price": product.price,
            })
        })
        .collect();
    let total: Price = lines
        .iter()
        .map(|(product, qty)| product.price.times(*qty))
        .sum();
    serde_json::json!({ "items": items, "total": total })
}
