//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shopfront_core::{UserId, UserRole};

use super::{RepositoryError, conflict_on_unique, parse_stored};
use crate::models::{NewUser, User, UserChanges};

/// Storage for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or username is taken.
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Get a user by ID.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Get every user whose ID is in `ids`. Unknown IDs are skipped.
    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;

    /// Get a user and their password hash by (normalized) email.
    async fn get_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    async fn set_role(&self, email: &str, role: UserRole) -> Result<User, RepositoryError>;

    /// Every user, oldest first.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// Apply `changes` to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown ID and
    /// `RepositoryError::Conflict` if the new email or username is taken.
    async fn update(&self, id: UserId, changes: &UserChanges) -> Result<User, RepositoryError>;

    /// Delete a user and their cart. Orders and history are kept.
    ///
    /// Returns whether the user existed.
    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError>;
}

/// `PostgreSQL` user repository.
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            role: parse_stored(&row.role, "user role")?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shopfront.users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, role, created_at
            ",
        )
        .bind(UserId::generate())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user"))?;

        User::try_from(row)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, role, created_at
            FROM shopfront.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = ids.iter().map(UserId::as_uuid).collect();
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, role, created_at
            FROM shopfront.users
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn get_password_hash(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(
            r"
            SELECT id, username, email, role, created_at, password_hash
            FROM shopfront.users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some((User::try_from(row.user)?, row.password_hash)))
    }

    async fn set_role(&self, email: &str, role: UserRole) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shopfront.users
            SET role = $2
            WHERE email = $1
            RETURNING id, username, email, role, created_at
            ",
        )
        .bind(email)
        .bind(role.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, role, created_at
            FROM shopfront.users
            ORDER BY created_at, username
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn update(&self, id: UserId, changes: &UserChanges) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shopfront.users
            SET username      = COALESCE($2, username),
                email         = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role          = COALESCE($5, role)
            WHERE id = $1
            RETURNING id, username, email, role, created_at
            ",
        )
        .bind(id)
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.password_hash.as_deref())
        .bind(changes.role.map(|role| role.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user"))?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        // carts.user_id cascades; orders and history hold no foreign key to users
        let result = sqlx::query("DELETE FROM shopfront.users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
