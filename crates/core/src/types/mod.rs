//! Core types for Shopfront.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{Price, PriceError};
pub use status::*;
