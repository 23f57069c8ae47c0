//! Order history ledger.
//!
//! Entries are only ever inserted. There is no update or delete path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use shopfront_core::{HistoryEntryId, OrderId, UserId};

use super::{RepositoryError, parse_stored};
use crate::models::OrderHistoryEntry;

/// Append-only storage for order status changes.
#[async_trait]
pub trait OrderHistoryRepository: Send + Sync {
    /// Append an entry. Its timestamp is raised to the order's latest entry
    /// if it would otherwise sort before it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the referenced order does not exist.
    async fn append(&self, entry: &OrderHistoryEntry) -> Result<(), RepositoryError>;

    /// Entries for an order, oldest first (ties in insertion order).
    async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderHistoryEntry>, RepositoryError>;
}

/// `PostgreSQL` history repository.
pub struct PgOrderHistoryRepository {
    pool: PgPool,
}

impl PgOrderHistoryRepository {
    /// Create a new history repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: HistoryEntryId,
    order_id: OrderId,
    status: String,
    changed_by: UserId,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for OrderHistoryEntry {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            status: parse_stored(&row.status, "history status")?,
            changed_by: row.changed_by,
            recorded_at: row.recorded_at,
        })
    }
}

/// Insert an entry on an existing connection or transaction.
///
/// Inserts nothing and returns `RepositoryError::NotFound` when the order is
/// missing. `recorded_at` never goes below the order's latest entry.
pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &OrderHistoryEntry,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO shopfront.order_history (id, order_id, status, changed_by, recorded_at)
        SELECT $1, o.id, $3, $4, GREATEST($5, COALESCE(MAX(h.recorded_at), $5))
        FROM shopfront.orders o
        LEFT JOIN shopfront.order_history h ON h.order_id = o.id
        WHERE o.id = $2
        GROUP BY o.id
        ",
    )
    .bind(entry.id)
    .bind(entry.order_id)
    .bind(entry.status.as_str())
    .bind(entry.changed_by)
    .bind(entry.recorded_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

#[async_trait]
impl OrderHistoryRepository for PgOrderHistoryRepository {
    async fn append(&self, entry: &OrderHistoryEntry) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, entry).await
    }

    async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT id, order_id, status, changed_by, recorded_at
            FROM shopfront.order_history
            WHERE order_id = $1
            ORDER BY recorded_at, seq
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(OrderHistoryEntry::try_from)
            .collect()
    }
}
