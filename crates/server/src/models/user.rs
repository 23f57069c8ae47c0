//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{UserId, UserRole};

/// A storefront user (domain type). Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Already normalized (trimmed, lowercase).
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: UserRole,
}

/// Fields to change on an existing user. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    /// Already normalized.
    pub email: Option<String>,
    /// Argon2 PHC string.
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
}

impl UserChanges {
    /// Whether nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether the caller holds admin capability.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}
