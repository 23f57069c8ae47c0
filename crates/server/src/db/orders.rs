//! Order repository.
//!
//! Orders are written together with their history entries: placing an order
//! inserts the order and its initial `Pending` entry in one transaction, and a
//! status change updates the order and appends the matching entry in one
//! transaction. An order is never visible without its history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use shopfront_core::{OrderId, OrderStatus, Price, UserId};

use super::{RepositoryError, history, parse_stored};
use crate::models::{Order, OrderHistoryEntry, OrderLine};

/// Storage for placed orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order together with its initial history entry.
    async fn create(
        &self,
        order: &Order,
        initial: &OrderHistoryEntry,
    ) -> Result<(), RepositoryError>;

    /// Get an order by ID.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// All orders placed by a user, oldest first (ties in insertion order).
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, newest first (ties newest insertion first).
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order from `expected` to `entry.status` and append `entry`.
    ///
    /// The change is stamped no earlier than the order's last change, so a
    /// lagging clock cannot put it before an earlier entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the order is no longer in `expected`.
    async fn update_status(
        &self,
        expected: OrderStatus,
        entry: &OrderHistoryEntry,
    ) -> Result<Order, RepositoryError>;
}

/// `PostgreSQL` order repository.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    items: Json<Vec<OrderLine>>,
    total: Price,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            total: row.total,
            status: parse_stored(&row.status, "order status")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, items, total, status, created_at, updated_at";

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(
        &self,
        order: &Order,
        initial: &OrderHistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO shopfront.orders (id, user_id, items, total, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        history::insert_entry(&mut *tx, initial).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopfront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopfront.orders WHERE user_id = $1 ORDER BY created_at, seq"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopfront.orders ORDER BY created_at DESC, seq DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_status(
        &self,
        expected: OrderStatus,
        entry: &OrderHistoryEntry,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shopfront.orders
            SET status = $2, updated_at = GREATEST($4, updated_at)
            WHERE id = $1 AND status = $3
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(entry.order_id)
        .bind(entry.status.as_str())
        .bind(expected.as_str())
        .bind(entry.recorded_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT status FROM shopfront.orders WHERE id = $1")
                    .bind(entry.order_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(current) => RepositoryError::Conflict(format!(
                    "order is {current}, expected {expected}"
                )),
                None => RepositoryError::NotFound,
            });
        };

        let entry = OrderHistoryEntry {
            recorded_at: row.updated_at,
            ..entry.clone()
        };
        history::insert_entry(&mut *tx, &entry).await?;

        tx.commit().await?;

        Order::try_from(row)
    }
}
