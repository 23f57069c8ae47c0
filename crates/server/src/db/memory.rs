//! In-memory backend.
//!
//! All repositories share one lock, so every trait method is atomic with
//! respect to every other, including the multi-record order writes. Used by
//! tests and by `SHOPFRONT_STORAGE=memory` development runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use shopfront_core::{OrderId, OrderStatus, ProductId, UserId, UserRole};

use super::{
    CartRepository, CatalogRepository, OrderHistoryRepository, OrderRepository, RepositoryError,
    UserRepository,
};
use crate::models::{
    Cart, CartItem, NewUser, Order, OrderHistoryEntry, Product, User, UserChanges,
};

#[derive(Default)]
struct MemoryState {
    carts: HashMap<UserId, Cart>,
    orders: Vec<Order>,
    history: Vec<OrderHistoryEntry>,
    products: HashMap<ProductId, Product>,
    users: Vec<(User, String)>,
}

impl MemoryState {
    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|order| order.id == id)
    }

    fn has_order(&self, id: OrderId) -> bool {
        self.orders.iter().any(|order| order.id == id)
    }

    /// `entry` with its timestamp raised to the order's latest entry.
    fn stamped(&self, entry: &OrderHistoryEntry) -> OrderHistoryEntry {
        let latest = self
            .history
            .iter()
            .filter(|existing| existing.order_id == entry.order_id)
            .map(|existing| existing.recorded_at)
            .max();

        let mut entry = entry.clone();
        if let Some(latest) = latest {
            entry.recorded_at = entry.recorded_at.max(latest);
        }
        entry
    }
}

/// Process-local store implementing every repository trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.state.lock().await.carts.get(&user_id).cloned())
    }

    async fn save(
        &self,
        user_id: UserId,
        items: &[CartItem],
        expected_version: Option<i64>,
    ) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        let current = state.carts.get(&user_id).map(|cart| cart.version);

        let version = match (current, expected_version) {
            (None, None) => 1,
            (Some(stored), Some(expected)) if stored == expected => stored + 1,
            _ => return Err(RepositoryError::VersionConflict),
        };

        let cart = Cart {
            user_id,
            items: items.to_vec(),
            version,
            updated_at: Utc::now(),
        };
        state.carts.insert(user_id, cart.clone());
        Ok(cart)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.carts.remove(&user_id).is_some())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(
        &self,
        order: &Order,
        initial: &OrderHistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.has_order(order.id) {
            return Err(RepositoryError::Conflict("order already exists".to_string()));
        }
        if initial.order_id != order.id {
            return Err(RepositoryError::NotFound);
        }
        state.orders.push(order.clone());
        state.history.push(initial.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|order| order.id == id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders = state.orders.clone();
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        expected: OrderStatus,
        entry: &OrderHistoryEntry,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let entry = state.stamped(entry);
        let order = state
            .order_mut(entry.order_id)
            .ok_or(RepositoryError::NotFound)?;

        if order.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "order is {}, expected {expected}",
                order.status
            )));
        }

        order.status = entry.status;
        order.updated_at = entry.recorded_at;
        let updated = order.clone();
        state.history.push(entry);
        Ok(updated)
    }
}

#[async_trait]
impl OrderHistoryRepository for MemoryStore {
    async fn append(&self, entry: &OrderHistoryEntry) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.has_order(entry.order_id) {
            return Err(RepositoryError::NotFound);
        }
        let entry = state.stamped(entry);
        state.history.push(entry);
        Ok(())
    }

    async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderHistoryEntry>, RepositoryError> {
        let state = self.state.lock().await;
        let mut entries: Vec<OrderHistoryEntry> = state
            .history
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        entries.sort_by_key(|entry| entry.recorded_at);
        Ok(entries)
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let taken = state
            .users
            .iter()
            .any(|(u, _)| u.email == user.email || u.username == user.username);
        if taken {
            return Err(RepositoryError::Conflict("user already exists".to_string()));
        }

        let created = User {
            id: UserId::generate(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state
            .users
            .push((created.clone(), user.password_hash.clone()));
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone()))
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|(u, _)| ids.contains(&u.id))
            .map(|(u, _)| u.clone())
            .collect())
    }

    async fn get_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|(u, _)| u.email == email).cloned())
    }

    async fn set_role(&self, email: &str, role: UserRole) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _) = state
            .users
            .iter_mut()
            .find(|(u, _)| u.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn update(&self, id: UserId, changes: &UserChanges) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;

        let taken = state.users.iter().any(|(u, _)| {
            u.id != id
                && (changes.email.as_ref() == Some(&u.email)
                    || changes.username.as_ref() == Some(&u.username))
        });
        if taken {
            return Err(RepositoryError::Conflict("user already exists".to_string()));
        }

        let (user, password_hash) = state
            .users
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(username) = &changes.username {
            user.username.clone_from(username);
        }
        if let Some(email) = &changes.email {
            user.email.clone_from(email);
        }
        if let Some(hash) = &changes.password_hash {
            password_hash.clone_from(hash);
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.users.len();
        state.users.retain(|(u, _)| u.id != id);
        if state.users.len() == before {
            return Ok(false);
        }
        state.carts.remove(&id);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use shopfront_core::Price;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            role: UserRole::Customer,
        }
    }

    fn order_for(user_id: UserId) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            user_id,
            items: Vec::new(),
            total: Price::from_cents(1_000),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_cart_version_precondition() {
        let store = MemoryStore::new();
        let user = UserId::generate();

        let created = CartRepository::save(&store, user, &[], None).await.unwrap();
        assert_eq!(created.version, 1);

        // Creating again is a conflict
        assert!(matches!(
            CartRepository::save(&store, user, &[], None).await,
            Err(RepositoryError::VersionConflict)
        ));

        // Stale version is a conflict
        let updated = CartRepository::save(&store, user, &[], Some(1)).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(matches!(
            CartRepository::save(&store, user, &[], Some(1)).await,
            Err(RepositoryError::VersionConflict)
        ));
    }

    #[tokio::test]
    async fn test_update_status_requires_expected_status() {
        let store = MemoryStore::new();
        let order = order_for(UserId::generate());
        let initial = OrderHistoryEntry::record(order.id, OrderStatus::Pending, order.user_id);
        OrderRepository::create(&store, &order, &initial).await.unwrap();

        let admin = UserId::generate();
        let entry = OrderHistoryEntry::record(order.id, OrderStatus::Shipped, admin);
        let result = store.update_status(OrderStatus::Paid, &entry).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        // No stray history entry after the failed update
        assert_eq!(store.list_for_order(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_requires_existing_order() {
        let store = MemoryStore::new();
        let entry =
            OrderHistoryEntry::record(OrderId::generate(), OrderStatus::Paid, UserId::generate());
        assert!(matches!(
            store.append(&entry).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_history_timestamps_never_go_backwards() {
        let store = MemoryStore::new();
        let order = order_for(UserId::generate());
        let initial = OrderHistoryEntry::record(order.id, OrderStatus::Pending, order.user_id);
        OrderRepository::create(&store, &order, &initial).await.unwrap();

        // A writer with a slow clock
        let mut lagging = OrderHistoryEntry::record(order.id, OrderStatus::Paid, order.user_id);
        lagging.recorded_at = initial.recorded_at - Duration::seconds(5);
        let updated = store
            .update_status(OrderStatus::Pending, &lagging)
            .await
            .unwrap();
        assert_eq!(updated.updated_at, initial.recorded_at);

        let mut stale = OrderHistoryEntry::record(order.id, OrderStatus::Shipped, order.user_id);
        stale.recorded_at = initial.recorded_at - Duration::seconds(60);
        store.append(&stale).await.unwrap();

        let entries = store.list_for_order(order.id).await.unwrap();
        let statuses: Vec<OrderStatus> = entries.iter().map(|entry| entry.status).collect();
        assert_eq!(
            statuses,
            vec![OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Shipped]
        );
        assert!(entries.iter().all(|entry| entry.recorded_at == initial.recorded_at));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let first = order_for(user);
        let mut second = order_for(user);
        second.created_at = first.created_at;
        second.updated_at = first.created_at;

        for order in [&first, &second] {
            let initial = OrderHistoryEntry::record(order.id, OrderStatus::Pending, user);
            OrderRepository::create(&store, order, &initial).await.unwrap();
        }

        let ids = |orders: Vec<Order>| orders.into_iter().map(|o| o.id).collect::<Vec<_>>();
        assert_eq!(
            ids(store.find_by_user(user).await.unwrap()),
            vec![first.id, second.id]
        );
        assert_eq!(ids(store.find_all().await.unwrap()), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::Customer,
        };
        UserRepository::create(&store, &new_user).await.unwrap();
        assert!(matches!(
            UserRepository::create(&store, &new_user).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_checks_uniqueness() {
        let store = MemoryStore::new();
        let ada = UserRepository::create(&store, &new_user("ada")).await.unwrap();
        UserRepository::create(&store, &new_user("bob")).await.unwrap();

        let taken = UserChanges {
            email: Some("bob@example.com".to_string()),
            ..UserChanges::default()
        };
        assert!(matches!(
            UserRepository::update(&store, ada.id, &taken).await,
            Err(RepositoryError::Conflict(_))
        ));

        // Keeping its own email is not a conflict
        let own = UserChanges {
            email: Some("ada@example.com".to_string()),
            role: Some(UserRole::Admin),
            ..UserChanges::default()
        };
        let updated = UserRepository::update(&store, ada.id, &own).await.unwrap();
        assert_eq!(updated.role, UserRole::Admin);

        assert!(matches!(
            UserRepository::update(&store, UserId::generate(), &own).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_user_keeps_orders() {
        let store = MemoryStore::new();
        let ada = UserRepository::create(&store, &new_user("ada")).await.unwrap();
        CartRepository::save(&store, ada.id, &[], None).await.unwrap();
        let order = order_for(ada.id);
        let initial = OrderHistoryEntry::record(order.id, OrderStatus::Pending, ada.id);
        OrderRepository::create(&store, &order, &initial).await.unwrap();

        assert!(UserRepository::delete(&store, ada.id).await.unwrap());
        assert!(!UserRepository::delete(&store, ada.id).await.unwrap());

        assert!(store.get_by_id(ada.id).await.unwrap().is_none());
        assert!(CartRepository::get(&store, ada.id).await.unwrap().is_none());
        assert_eq!(store.find_by_user(ada.id).await.unwrap().len(), 1);
        assert_eq!(store.list_for_order(order.id).await.unwrap().len(), 1);
    }
}
