//! Domain models for the storefront API.
//!
//! These types represent validated domain objects separate from database row
//! types. Wire names follow the SPA's camelCase JSON.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, ProductSnapshot};
pub use order::{
    CustomerSummary, HistoryEntryView, Order, OrderHistoryEntry, OrderLine, OrderLineView,
    OrderView,
};
pub use product::Product;
pub use user::{CurrentUser, NewUser, User, UserChanges};
