//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{Price, ProductId, UserId};

/// One line in a cart.
///
/// A denormalized snapshot: name, price and image are copied when the item is
/// added and do not follow later catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Catalog product this line was taken from.
    pub product_id: ProductId,
    /// Product name at add time.
    pub name: String,
    /// Unit price at add time.
    pub price: Price,
    /// Product image URL at add time.
    #[serde(default)]
    pub image: String,
    /// Identifier of this line within the cart, used for removal.
    #[serde(rename = "cartId")]
    pub client_item_id: String,
}

/// What the client sends when adding to the cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    /// Optional client-chosen line identifier.
    #[serde(default, rename = "cartId")]
    pub client_item_id: Option<String>,
}

/// A user's cart document.
#[derive(Debug, Clone)]
pub struct Cart {
    /// Owner; at most one cart per user.
    pub user_id: UserId,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Whether a line with this identifier exists.
    #[must_use]
    pub fn contains(&self, client_item_id: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.client_item_id == client_item_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_wire_names() {
        let item = CartItem {
            product_id: ProductId::generate(),
            name: "Lamp".to_string(),
            price: Price::from_cents(4_999),
            image: "/img/lamp.png".to_string(),
            client_item_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["cartId"], "abc");
        assert_eq!(json["name"], "Lamp");
        assert!(json["productId"].is_string());
        assert!(json["price"].is_number());
    }

    #[test]
    fn test_snapshot_cart_id_optional() {
        let id = ProductId::generate();
        let body = format!(r#"{{"productId":"{id}","name":"Lamp","price":49.99}}"#);
        let snapshot: ProductSnapshot = serde_json::from_str(&body).unwrap();
        assert_eq!(snapshot.product_id, id);
        assert!(snapshot.client_item_id.is_none());
        assert!(snapshot.image.is_empty());
    }
}
