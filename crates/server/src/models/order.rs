//! Order and order history domain types.
//!
//! An [`Order`] is immutable after checkout except for its status. Each status
//! it has held is recorded as an [`OrderHistoryEntry`], which lives in its own
//! append-only ledger and is looked up by order ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{HistoryEntryId, OrderId, OrderStatus, Price, ProductId, UserId};

/// One purchased product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(rename = "qty")]
    pub quantity: u32,
    /// Unit price at purchase time.
    #[serde(rename = "price")]
    pub unit_price: Price,
}

impl OrderLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    /// Purchasing user.
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    /// Computed once at checkout, never recomputed.
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One status change in an order's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHistoryEntry {
    pub id: HistoryEntryId,
    pub order_id: OrderId,
    /// Status the order moved into.
    pub status: OrderStatus,
    /// User who made the change (the customer for the initial `Pending`).
    pub changed_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

impl OrderHistoryEntry {
    /// New entry stamped with the current time.
    #[must_use]
    pub fn record(order_id: OrderId, status: OrderStatus, changed_by: UserId) -> Self {
        Self {
            id: HistoryEntryId::generate(),
            order_id,
            status,
            changed_by,
            recorded_at: Utc::now(),
        }
    }
}

// =============================================================================
// Read Views
// =============================================================================

/// Minimal user reference shown next to an order or history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Order line with the product reference resolved to a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub product_name: String,
    pub qty: u32,
    pub price: Price,
}

/// Order as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    /// Resolved owner, only on admin listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
    pub items: Vec<OrderLineView>,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// History entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub id: HistoryEntryId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_by: CustomerSummary,
    pub timestamp: DateTime<Utc>,
}
