//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, password login, bearer tokens
//! - `cart` - Per-user cart with optimistic concurrency
//! - `catalog` - Product reads and the product-name cache
//! - `checkout` - Cart to order, priced from the catalog
//! - `orders` - Order lifecycle and read views

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use auth::{AuthError, AuthService, TokenService};
pub use cart::{CartError, CartService};
pub use catalog::CatalogService;
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use orders::{OrderError, OrderService};
