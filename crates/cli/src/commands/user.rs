//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a customer
//! sf-cli user create -u ada -e ada@example.com -p 'correct horse'
//!
//! # Create an admin directly
//! sf-cli user create -u ops -e ops@example.com -p 'correct horse' -r admin
//!
//! # Grant admin to an existing account
//! sf-cli user promote -e ada@example.com
//! ```

use shopfront_core::{UserId, UserRole};
use shopfront_server::db::{self, Store};
use shopfront_server::services::AuthService;

use super::{CommandError, database_url};

async fn auth_service() -> Result<AuthService, CommandError> {
    let pool = db::create_pool(&database_url()?).await?;
    Ok(AuthService::new(Store::postgres(pool).users))
}

/// Create a user account.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error for an unknown role, invalid input, a taken email or
/// username, or a database failure.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<UserId, CommandError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| CommandError::InvalidRole(role.to_owned()))?;

    let auth = auth_service().await?;
    let user = auth.register(username, email, password, role).await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}

/// Grant the admin role to an existing user.
///
/// # Errors
///
/// Returns an error if no user has this email or the database fails.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let auth = auth_service().await?;
    let user = auth.set_role(email, UserRole::Admin).await?;

    tracing::info!("{} ({}) is now an admin", user.username, user.email);
    Ok(())
}
