//! Persistence for the storefront API.
//!
//! # Schema: `shopfront`
//!
//! ## Tables
//!
//! - `users` - Accounts and roles
//! - `products` - Catalog (authoritative prices)
//! - `carts` - One cart document per user (`items` JSONB, `version` for
//!   optimistic concurrency)
//! - `orders` - Placed orders (`items` JSONB snapshot)
//! - `order_history` - Append-only status ledger
//!
//! # Backends
//!
//! Every table has a repository trait with a `PostgreSQL` implementation in its
//! own module and an in-memory implementation in [`memory`]. Services only see
//! the traits, bundled in [`Store`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod history;
pub mod memory;
pub mod orders;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::{CartRepository, PgCartRepository};
pub use catalog::{CatalogRepository, PgCatalogRepository};
pub use history::{OrderHistoryRepository, PgOrderHistoryRepository};
pub use memory::MemoryStore;
pub use orders::{OrderRepository, PgOrderRepository};
pub use users::{PgUserRepository, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The record changed since it was read.
    #[error("concurrent modification")]
    VersionConflict,
}

/// All repositories behind one cheaply cloneable handle.
#[derive(Clone)]
pub struct Store {
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub history: Arc<dyn OrderHistoryRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub users: Arc<dyn UserRepository>,
    pool: Option<PgPool>,
}

impl Store {
    /// Repositories backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            history: Arc::new(PgOrderHistoryRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repositories backed by one shared in-memory store.
    #[must_use]
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            carts: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            history: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            pool: None,
        }
    }

    /// Check that the backend answers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database cannot be reached.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Parse a stored enum value, reporting bad data as corruption.
pub(crate) fn parse_stored<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}
