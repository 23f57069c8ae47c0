//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (store ping)
//!
//! # Auth (register and login rate limited)
//! POST   /auth/register             - Create account, returns token
//! POST   /auth/login                - Returns token
//! GET    /auth/me                   - Current user (user)
//! PUT    /auth/profile              - Update own profile (user)
//! GET    /auth                      - All users (admin)
//! PUT    /auth/{id}                 - Edit a user (admin)
//! DELETE /auth/{id}                 - Delete a user (admin)
//!
//! # Products
//! GET    /products                  - Catalog
//! GET    /products/{id}             - One product
//!
//! # Cart (user)
//! GET    /cart                      - Items, [] if none
//! POST   /cart                      - Add item
//! DELETE /cart                      - Delete cart
//! DELETE /cart/{cart_id}            - Remove item
//!
//! # Orders
//! POST   /orders                    - Checkout (user)
//! GET    /orders                    - All orders (admin)
//! GET    /orders/user/{id}          - A user's orders (that user or admin)
//! GET    /orders/{id}               - One order (owner or admin)
//! PUT    /orders/status/{id}        - Change status (admin)
//! GET    /orders/{id}/transitions   - Next legal statuses (admin)
//!
//! # Order history
//! GET    /order-history/{order_id}  - Status changes (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod order_history;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/", get(auth::index))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/{id}", put(auth::update_user).delete(auth::delete_user))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{cart_id}", delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/user/{id}", get(orders::for_user))
        .route("/status/{id}", put(orders::update_status))
        .route("/{id}", get(orders::show))
        .route("/{id}/transitions", get(orders::transitions))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/order-history/{order_id}", get(order_history::show))
}
