//! Cart service.
//!
//! Every mutation is a read-modify-write of the user's cart document guarded
//! by its version. A lost race re-reads and re-applies the change, up to
//! [`MAX_ATTEMPTS`] times.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use shopfront_core::UserId;

use crate::db::{CartRepository, RepositoryError};
use crate::models::{Cart, CartItem, ProductSnapshot};

/// Attempts per mutation before giving up on a contended cart.
pub const MAX_ATTEMPTS: usize = 3;

/// Errors from cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// The user has no cart.
    #[error("Cart not found")]
    NotFound,

    /// The cart kept changing underneath us.
    #[error("Cart was modified concurrently, please retry")]
    Contention,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Per-user cart operations.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(carts: Arc<dyn CartRepository>) -> Self {
        Self { carts }
    }

    /// Items in the user's cart; empty if the user has no cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn get(&self, user_id: UserId) -> Result<Vec<CartItem>, CartError> {
        Ok(self
            .carts
            .get(user_id)
            .await?
            .map(|cart| cart.items)
            .unwrap_or_default())
    }

    /// Append an item, creating the cart if needed.
    ///
    /// The client's `cartId` is kept when it is non-empty and not already in
    /// the cart; otherwise a fresh one is generated. Every call adds a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Contention` if the cart stays contended.
    #[instrument(skip(self, snapshot), fields(user_id = %user_id, product_id = %snapshot.product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        snapshot: ProductSnapshot,
    ) -> Result<Vec<CartItem>, CartError> {
        self.mutate(user_id, |cart| {
            let mut items = cart.map(|c| c.items.clone()).unwrap_or_default();
            let requested = snapshot
                .client_item_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty());

            let client_item_id = match requested {
                Some(id) if !items.iter().any(|item| item.client_item_id == id) => id.to_string(),
                _ => Uuid::new_v4().to_string(),
            };

            items.push(CartItem {
                product_id: snapshot.product_id,
                name: snapshot.name.clone(),
                price: snapshot.price,
                image: snapshot.image.clone(),
                client_item_id,
            });
            Ok(Some(items))
        })
        .await
    }

    /// Remove the line with this `cartId`.
    ///
    /// A missing line leaves the cart unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the user has no cart.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        client_item_id: &str,
    ) -> Result<Vec<CartItem>, CartError> {
        self.mutate(user_id, |cart| {
            let cart = cart.ok_or(CartError::NotFound)?;
            if !cart.contains(client_item_id) {
                return Ok(None);
            }
            let items = cart
                .items
                .iter()
                .filter(|item| item.client_item_id != client_item_id)
                .cloned()
                .collect();
            Ok(Some(items))
        })
        .await
    }

    /// Delete the cart record. The next add starts a new cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), CartError> {
        self.carts.delete(user_id).await?;
        Ok(())
    }

    /// Optimistic read-modify-write loop.
    ///
    /// `apply` returns the new item list, or `None` to leave the cart as is.
    async fn mutate<F>(&self, user_id: UserId, mut apply: F) -> Result<Vec<CartItem>, CartError>
    where
        F: FnMut(Option<&Cart>) -> Result<Option<Vec<CartItem>>, CartError> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.carts.get(user_id).await?;

            let Some(items) = apply(current.as_ref())? else {
                return Ok(current.map(|cart| cart.items).unwrap_or_default());
            };

            let expected = current.as_ref().map(|cart| cart.version);
            match self.carts.save(user_id, &items, expected).await {
                Ok(saved) => return Ok(saved.items),
                Err(RepositoryError::VersionConflict) => {
                    tracing::debug!(attempt, "Cart version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(user_id = %user_id, "Cart write abandoned after repeated conflicts");
        Err(CartError::Contention)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db::MemoryStore;
    use shopfront_core::{Price, ProductId};

    fn service() -> CartService {
        CartService::new(Arc::new(MemoryStore::new()))
    }

    fn snapshot(name: &str, cents: u32, cart_id: Option<&str>) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::generate(),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image: String::new(),
            client_item_id: cart_id.map(ToString::to_string),
        }
    }

    /// Fails the first `failures` saves with a version conflict.
    struct ContendedCarts {
        inner: MemoryStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl CartRepository for ContendedCarts {
        async fn get(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
            CartRepository::get(&self.inner, user_id).await
        }

        async fn save(
            &self,
            user_id: UserId,
            items: &[CartItem],
            expected_version: Option<i64>,
        ) -> Result<Cart, RepositoryError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RepositoryError::VersionConflict);
            }
            self.inner.save(user_id, items, expected_version).await
        }

        async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
            self.inner.delete(user_id).await
        }
    }

    #[tokio::test]
    async fn test_get_without_cart_is_empty() {
        assert!(service().get(UserId::generate()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_items_sum() {
        let carts = service();
        let user = UserId::generate();

        carts.add_item(user, snapshot("A", 10_000, None)).await.unwrap();
        let items = carts.add_item(user, snapshot("B", 5_000, None)).await.unwrap();

        assert_eq!(items.len(), 2);
        let sum: Price = items.iter().map(|item| item.price).sum();
        assert_eq!(sum, Price::from_cents(15_000));
    }

    #[tokio::test]
    async fn test_duplicate_client_ids_are_replaced() {
        let carts = service();
        let user = UserId::generate();

        for _ in 0..5 {
            carts
                .add_item(user, snapshot("A", 100, Some("same")))
                .await
                .unwrap();
        }
        carts.add_item(user, snapshot("A", 100, Some(""))).await.unwrap();

        let items = carts.get(user).await.unwrap();
        assert_eq!(items.len(), 6);
        let ids: HashSet<&str> = items.iter().map(|i| i.client_item_id.as_str()).collect();
        assert_eq!(ids.len(), 6);
        assert!(ids.contains("same"));
    }

    #[tokio::test]
    async fn test_remove_item() {
        let carts = service();
        let user = UserId::generate();
        carts.add_item(user, snapshot("A", 100, Some("a"))).await.unwrap();
        carts.add_item(user, snapshot("B", 200, Some("b"))).await.unwrap();

        let items = carts.remove_item(user, "a").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().client_item_id, "b");
    }

    #[tokio::test]
    async fn test_remove_missing_item_is_noop() {
        let carts = service();
        let user = UserId::generate();
        let before = carts.add_item(user, snapshot("A", 100, None)).await.unwrap();

        let after = carts.remove_item(user, "nope").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_remove_without_cart_is_not_found() {
        assert!(matches!(
            service().remove_item(UserId::generate(), "x").await,
            Err(CartError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_clear_then_get_is_empty() {
        let carts = service();
        let user = UserId::generate();
        carts.add_item(user, snapshot("A", 100, None)).await.unwrap();

        carts.clear(user).await.unwrap();
        assert!(carts.get(user).await.unwrap().is_empty());

        // Clearing twice is fine, and the next add starts over
        carts.clear(user).await.unwrap();
        let items = carts.add_item(user, snapshot("B", 100, None)).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let carts = CartService::new(Arc::new(ContendedCarts {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(MAX_ATTEMPTS - 1),
        }));
        let items = carts
            .add_item(UserId::generate(), snapshot("A", 100, None))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let carts = CartService::new(Arc::new(ContendedCarts {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(MAX_ATTEMPTS),
        }));
        assert!(matches!(
            carts.add_item(UserId::generate(), snapshot("A", 100, None)).await,
            Err(CartError::Contention)
        ));
    }
}
