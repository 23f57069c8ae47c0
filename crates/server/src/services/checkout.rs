//! Checkout: turning a submitted cart into an order.
//!
//! Client prices are only accepted as a cross-check. Every line is priced from
//! the catalog, and the request is rejected when the client's line prices or
//! declared total drift from the catalog by more than the configured tolerance.
//! The order and its initial `Pending` history entry are written atomically.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use super::catalog::CatalogService;
use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, OrderHistoryEntry, OrderLine};

/// A line as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub qty: u32,
    /// Unit price the client displayed.
    pub price: Price,
}

/// `POST /orders` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutLine>,
    /// Total the client displayed.
    pub total: Price,
}

/// Errors from checkout.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line or the total does not check out against the catalog.
    #[error("{0}")]
    Validation(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Places orders.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    catalog: CatalogService,
    tolerance: Decimal,
}

impl CheckoutService {
    /// Create a checkout service.
    #[must_use]
    pub fn new(orders: Arc<dyn OrderRepository>, catalog: CatalogService, tolerance: Decimal) -> Self {
        Self {
            orders,
            catalog,
            tolerance,
        }
    }

    /// Place an order for `user_id`.
    ///
    /// Clearing the cart afterwards is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty request and
    /// `CheckoutError::Validation` when a line or the total is rejected.
    /// Nothing is written in either case.
    #[instrument(skip(self, request), fields(user_id = %user_id, lines = request.items.len()))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = request.items.iter().map(|line| line.product_id).collect();
        let catalog = self.catalog.current(&ids).await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            if line.qty == 0 {
                return Err(CheckoutError::Validation(format!(
                    "Quantity for product {} must be at least 1",
                    line.product_id
                )));
            }

            let product = catalog.get(&line.product_id).ok_or_else(|| {
                CheckoutError::Validation(format!("Product {} is not available", line.product_id))
            })?;

            if !line.price.within(product.price, self.tolerance) {
                return Err(CheckoutError::Validation(format!(
                    "Price of {} changed from {} to {}",
                    product.name, line.price, product.price
                )));
            }

            items.push(OrderLine {
                product_id: product.id,
                quantity: line.qty,
                unit_price: product.price,
            });
        }

        let total: Price = items.iter().map(OrderLine::line_total).sum();
        if !request.total.within(total, self.tolerance) {
            return Err(CheckoutError::Validation(format!(
                "Order total {} does not match {}",
                request.total, total
            )));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            user_id,
            items,
            total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let initial = OrderHistoryEntry::record(order.id, OrderStatus::Pending, user_id);

        if let Err(e) = self.orders.create(&order, &initial).await {
            tracing::error!(order_id = %order.id, user_id = %user_id, error = %e, "Failed to place order");
            return Err(e.into());
        }

        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::{CatalogRepository, MemoryStore, OrderHistoryRepository};
    use crate::models::Product;

    struct Fixture {
        store: MemoryStore,
        checkout: CheckoutService,
        a: Product,
        b: Product,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let a = Product {
            id: ProductId::generate(),
            name: "A".to_string(),
            price: Price::from_cents(10_000),
            image: String::new(),
            category: None,
            description: None,
        };
        let b = Product {
            id: ProductId::generate(),
            name: "B".to_string(),
            price: Price::from_cents(5_000),
            ..a.clone()
        };
        store.upsert(&a).await.unwrap();
        store.upsert(&b).await.unwrap();

        let catalog = CatalogService::new(Arc::new(store.clone()), Duration::from_secs(60));
        let checkout = CheckoutService::new(Arc::new(store.clone()), catalog, Decimal::new(1, 2));
        Fixture {
            store,
            checkout,
            a,
            b,
        }
    }

    fn line(product: &Product, qty: u32) -> CheckoutLine {
        CheckoutLine {
            product_id: product.id,
            qty,
            price: product.price,
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_pending_order_with_history() {
        let f = fixture().await;
        let user = UserId::generate();
        let request = CheckoutRequest {
            items: vec![line(&f.a, 1), line(&f.b, 1)],
            total: Price::from_cents(15_000),
        };

        let order = f.checkout.checkout(user, &request).await.unwrap();
        assert_eq!(order.total, Price::from_cents(15_000));
        assert_eq!(order.status, OrderStatus::Pending);

        let history = f.store.list_for_order(order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().unwrap().status, OrderStatus::Pending);
        assert_eq!(history.first().unwrap().changed_by, user);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let f = fixture().await;
        let user = UserId::generate();
        let request = CheckoutRequest {
            items: Vec::new(),
            total: Price::ZERO,
        };
        assert!(matches!(
            f.checkout.checkout(user, &request).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert!(f.store.find_by_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_price_rejected() {
        let f = fixture().await;
        let user = UserId::generate();
        let mut cheap = line(&f.a, 1);
        cheap.price = Price::from_cents(100);
        let request = CheckoutRequest {
            items: vec![cheap],
            total: Price::from_cents(100),
        };
        assert!(matches!(
            f.checkout.checkout(user, &request).await,
            Err(CheckoutError::Validation(_))
        ));
        assert!(f.store.find_by_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_total_must_match() {
        let f = fixture().await;
        let request = CheckoutRequest {
            items: vec![line(&f.a, 2)],
            total: Price::from_cents(10_000),
        };
        assert!(matches!(
            f.checkout.checkout(UserId::generate(), &request).await,
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_total_within_tolerance_uses_catalog_total() {
        let f = fixture().await;
        let request = CheckoutRequest {
            items: vec![line(&f.a, 2)],
            total: Price::from_cents(20_001),
        };
        let order = f.checkout.checkout(UserId::generate(), &request).await.unwrap();
        assert_eq!(order.total, Price::from_cents(20_000));
        assert_eq!(order.items.first().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_unknown_product_and_zero_qty_rejected() {
        let f = fixture().await;
        let unknown = CheckoutRequest {
            items: vec![CheckoutLine {
                product_id: ProductId::generate(),
                qty: 1,
                price: Price::from_cents(100),
            }],
            total: Price::from_cents(100),
        };
        assert!(matches!(
            f.checkout.checkout(UserId::generate(), &unknown).await,
            Err(CheckoutError::Validation(_))
        ));

        let zero = CheckoutRequest {
            items: vec![line(&f.a, 0)],
            total: Price::ZERO,
        };
        assert!(matches!(
            f.checkout.checkout(UserId::generate(), &zero).await,
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_total_unaffected_by_later_price_change() {
        let f = fixture().await;
        let request = CheckoutRequest {
            items: vec![line(&f.a, 1)],
            total: Price::from_cents(10_000),
        };
        let order = f.checkout.checkout(UserId::generate(), &request).await.unwrap();

        let mut repriced = f.a.clone();
        repriced.price = Price::from_cents(99_900);
        f.store.upsert(&repriced).await.unwrap();

        let stored = f.store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.total, Price::from_cents(10_000));
        assert_eq!(stored.items.first().unwrap().unit_price, Price::from_cents(10_000));
    }
}
