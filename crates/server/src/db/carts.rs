//! Cart repository.
//!
//! A cart is a single document per user. Writes are compare-and-set on the
//! `version` column so two concurrent read-modify-write cycles cannot silently
//! overwrite each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use shopfront_core::UserId;

use super::RepositoryError;
use crate::models::{Cart, CartItem};

/// Storage for per-user carts.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Get a user's cart, if one exists.
    async fn get(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Write a cart's items.
    ///
    /// With `expected_version = None` the cart must not exist yet; otherwise
    /// the stored version must equal `expected_version`. The returned cart
    /// carries the new version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict` if the precondition fails.
    async fn save(
        &self,
        user_id: UserId,
        items: &[CartItem],
        expected_version: Option<i64>,
    ) -> Result<Cart, RepositoryError>;

    /// Delete a user's cart. Returns whether a cart existed.
    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}

/// `PostgreSQL` cart repository.
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    user_id: UserId,
    items: Json<Vec<CartItem>>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            user_id: row.user_id,
            items: row.items.0,
            version: row.version,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn get(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT user_id, items, version, updated_at
            FROM shopfront.carts
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    async fn save(
        &self,
        user_id: UserId,
        items: &[CartItem],
        expected_version: Option<i64>,
    ) -> Result<Cart, RepositoryError> {
        let row = match expected_version {
            None => {
                sqlx::query_as::<_, CartRow>(
                    r"
                    INSERT INTO shopfront.carts (user_id, items, version, updated_at)
                    VALUES ($1, $2, 1, NOW())
                    ON CONFLICT (user_id) DO NOTHING
                    RETURNING user_id, items, version, updated_at
                    ",
                )
                .bind(user_id)
                .bind(Json(items))
                .fetch_optional(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query_as::<_, CartRow>(
                    r"
                    UPDATE shopfront.carts
                    SET items = $2, version = version + 1, updated_at = NOW()
                    WHERE user_id = $1 AND version = $3
                    RETURNING user_id, items, version, updated_at
                    ",
                )
                .bind(user_id)
                .bind(Json(items))
                .bind(version)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(Cart::from).ok_or(RepositoryError::VersionConflict)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shopfront.carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
