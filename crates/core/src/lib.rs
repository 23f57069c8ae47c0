//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `server` - JSON API for the storefront SPA and the admin console
//! - `cli` - Command-line tools for migrations, catalog seeding and users
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. The order lifecycle lives here so that every caller checks
//! transitions against the same table, independent of the storage layer.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, the order status machine and user roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
