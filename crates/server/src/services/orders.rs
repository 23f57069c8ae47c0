//! Order status changes and order reads.
//!
//! A status change is checked against [`OrderStatus::can_transition_to`]
//! before anything is written, then applied as a compare-and-set on the
//! status that was read, in the same transaction as its history entry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus, ProductId, UserId};

use super::catalog::{CatalogService, PRODUCT_PLACEHOLDER};
use crate::db::{OrderHistoryRepository, OrderRepository, RepositoryError, UserRepository};
use crate::models::{
    CurrentUser, CustomerSummary, HistoryEntryView, Order, OrderHistoryEntry, OrderLineView,
    OrderView, User,
};

/// Display name for a user that no longer exists.
pub const USER_PLACEHOLDER: &str = "Unknown user";

/// Errors from order operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Caller may not see or change this order.
    #[error("Access denied")]
    Forbidden,

    /// No such order.
    #[error("Order not found")]
    NotFound,

    /// Not an edge of the order lifecycle.
    #[error("Cannot change order status from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// The order changed between read and write.
    #[error("Order was modified concurrently: {0}")]
    Conflict(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order lifecycle and read views.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    history: Arc<dyn OrderHistoryRepository>,
    users: Arc<dyn UserRepository>,
    catalog: CatalogService,
}

impl OrderService {
    /// Create an order service.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        history: Arc<dyn OrderHistoryRepository>,
        users: Arc<dyn UserRepository>,
        catalog: CatalogService,
    ) -> Self {
        Self {
            orders,
            history,
            users,
            catalog,
        }
    }

    // =========================================================================
    // Status Changes
    // =========================================================================

    /// Move an order to `target`, recording `actor` in its history.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` if `actor` is not an admin,
    /// `OrderError::NotFound` for an unknown order,
    /// `OrderError::IllegalTransition` if the lifecycle forbids the change and
    /// `OrderError::Conflict` if another change won the race. The order is
    /// untouched in every error case.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: &CurrentUser,
    ) -> Result<Order, OrderError> {
        if !actor.is_admin() {
            tracing::warn!(order_id = %order_id, "Non-admin attempted status change");
            return Err(OrderError::Forbidden);
        }

        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.can_transition_to(target) {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: target,
            });
        }

        let entry = OrderHistoryEntry::record(order_id, target, actor.id);
        let updated = self
            .orders
            .update_status(order.status, &entry)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::NotFound,
                RepositoryError::Conflict(msg) => OrderError::Conflict(msg),
                other => OrderError::Repository(other),
            })?;

        tracing::info!(
            order_id = %order_id,
            from = %order.status,
            to = %target,
            "Order status changed"
        );
        Ok(updated)
    }

    /// Statuses the order may move to next.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for non-admins and
    /// `OrderError::NotFound` for an unknown order.
    pub async fn allowed_transitions(
        &self,
        order_id: OrderId,
        caller: &CurrentUser,
    ) -> Result<Vec<OrderStatus>, OrderError> {
        require_admin(caller)?;
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        Ok(order.status.allowed_transitions().to_vec())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// One order, for its owner or an admin.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Forbidden`.
    pub async fn get(&self, order_id: OrderId, caller: &CurrentUser) -> Result<OrderView, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if order.user_id != caller.id && !caller.is_admin() {
            return Err(OrderError::Forbidden);
        }

        let mut views = self.views(vec![order], false).await?;
        views.pop().ok_or(OrderError::NotFound)
    }

    /// A user's orders, for that user or an admin.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for anyone else.
    pub async fn for_user(
        &self,
        user_id: UserId,
        caller: &CurrentUser,
    ) -> Result<Vec<OrderView>, OrderError> {
        if user_id != caller.id && !caller.is_admin() {
            return Err(OrderError::Forbidden);
        }
        let orders = self.orders.find_by_user(user_id).await?;
        self.views(orders, false).await
    }

    /// Every order with its owner resolved, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for non-admins.
    pub async fn all(&self, caller: &CurrentUser) -> Result<Vec<OrderView>, OrderError> {
        require_admin(caller)?;
        let orders = self.orders.find_all().await?;
        self.views(orders, true).await
    }

    /// An order's status history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for non-admins and
    /// `OrderError::NotFound` for an unknown order.
    pub async fn history(
        &self,
        order_id: OrderId,
        caller: &CurrentUser,
    ) -> Result<Vec<HistoryEntryView>, OrderError> {
        require_admin(caller)?;
        if self.orders.find_by_id(order_id).await?.is_none() {
            return Err(OrderError::NotFound);
        }

        let entries = self.history.list_for_order(order_id).await?;
        let actors: Vec<UserId> = entries.iter().map(|entry| entry.changed_by).collect();
        let users = self.users_by_id(actors).await?;

        Ok(entries
            .into_iter()
            .map(|entry| HistoryEntryView {
                id: entry.id,
                order_id: entry.order_id,
                status: entry.status,
                changed_by: summarize(entry.changed_by, users.get(&entry.changed_by), false),
                timestamp: entry.recorded_at,
            })
            .collect())
    }

    /// Resolve product names, and owners when `with_customer` is set.
    async fn views(
        &self,
        orders: Vec<Order>,
        with_customer: bool,
    ) -> Result<Vec<OrderView>, OrderError> {
        let product_ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|order| order.items.iter().map(|line| line.product_id))
            .collect();
        let names = self.catalog.names(&product_ids).await?;

        let users = if with_customer {
            let owners: Vec<UserId> = orders.iter().map(|order| order.user_id).collect();
            self.users_by_id(owners).await?
        } else {
            HashMap::new()
        };

        Ok(orders
            .into_iter()
            .map(|order| OrderView {
                id: order.id,
                user_id: order.user_id,
                customer: with_customer
                    .then(|| summarize(order.user_id, users.get(&order.user_id), true)),
                items: order
                    .items
                    .iter()
                    .map(|line| OrderLineView {
                        product_id: line.product_id,
                        product_name: names
                            .get(&line.product_id)
                            .cloned()
                            .unwrap_or_else(|| PRODUCT_PLACEHOLDER.to_string()),
                        qty: line.quantity,
                        price: line.unit_price,
                    })
                    .collect(),
                total: order.total,
                status: order.status,
                created_at: order.created_at,
                updated_at: order.updated_at,
            })
            .collect())
    }

    async fn users_by_id(
        &self,
        mut ids: Vec<UserId>,
    ) -> Result<HashMap<UserId, User>, OrderError> {
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.users.get_many(&ids).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}

fn require_admin(caller: &CurrentUser) -> Result<(), OrderError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(OrderError::Forbidden)
    }
}

fn summarize(id: UserId, user: Option<&User>, with_email: bool) -> CustomerSummary {
    match user {
        Some(user) => CustomerSummary {
            id,
            username: user.username.clone(),
            email: with_email.then(|| user.email.clone()),
        },
        None => CustomerSummary {
            id,
            username: USER_PLACEHOLDER.to_string(),
            email: None,
        },
    }
}
