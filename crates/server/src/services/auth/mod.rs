//! Authentication service.
//!
//! Password accounts with Argon2id hashes, plus signed bearer tokens (see
//! [`token`]). Tokens only carry identity; the role is always re-read from
//! the user record when a request is authenticated.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenService};

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use shopfront_core::{UserId, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{CurrentUser, NewUser, User, UserChanges};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length.
const MAX_USERNAME_LENGTH: usize = 64;

/// Authentication service.
///
/// Handles registration, password login and resolving token claims to the
/// current user.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for bad input, and
    /// `AuthError::UserAlreadyExists` if the email or username is taken.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let username = validate_username(username)?;
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&NewUser {
                username,
                email,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Resolve verified token claims to the current user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the user no longer exists.
    pub async fn authenticate(&self, claims: &Claims) -> Result<CurrentUser, AuthError> {
        let user = self
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.role != claims.role {
            tracing::debug!(user_id = %user.id, "Role changed since token was issued");
        }

        Ok(CurrentUser::from(&user))
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update the caller's own username, email or password.
    ///
    /// Empty or missing fields are left unchanged. The role cannot be changed
    /// here.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`AuthService::register`],
    /// `AuthError::UserAlreadyExists` if the new email or username is taken
    /// and `AuthError::UserNotFound` if the account is gone.
    #[instrument(skip(self, username, email, password))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AuthError> {
        let password_hash = match provided(password) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let changes = UserChanges {
            username: provided(username).map(validate_username).transpose()?,
            email: provided(email).map(normalize_email).transpose()?,
            password_hash,
            role: None,
        };

        let user = self.apply(user_id, &changes).await?;
        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Every account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list().await?)
    }

    /// Admin edit of another account's username, email or role.
    ///
    /// # Errors
    ///
    /// Returns validation errors for bad input, `AuthError::UserAlreadyExists`
    /// on a taken email or username and `AuthError::UserNotFound` for an
    /// unknown ID.
    #[instrument(skip(self, username, email))]
    pub async fn update_user(
        &self,
        user_id: UserId,
        username: Option<&str>,
        email: Option<&str>,
        role: Option<UserRole>,
    ) -> Result<User, AuthError> {
        let changes = UserChanges {
            username: provided(username).map(validate_username).transpose()?,
            email: provided(email).map(normalize_email).transpose()?,
            password_hash: None,
            role,
        };

        let user = self.apply(user_id, &changes).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User updated");
        Ok(user)
    }

    /// Delete an account. Its cart goes with it; its orders and their history
    /// stay and show the owner as unknown.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SelfDeletion` when `actor` targets their own
    /// account and `AuthError::UserNotFound` for an unknown ID.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_user(&self, user_id: UserId, actor: &CurrentUser) -> Result<(), AuthError> {
        if user_id == actor.id {
            return Err(AuthError::SelfDeletion);
        }
        if !self.users.delete(user_id).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    async fn apply(&self, user_id: UserId, changes: &UserChanges) -> Result<User, AuthError> {
        if changes.is_empty() {
            return self.get_user(user_id).await;
        }
        self.users
            .update(user_id, changes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Set a user's role, looked up by email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no user has this email.
    pub async fn set_role(&self, email: &str, role: UserRole) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        self.users
            .set_role(&email, role)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// A form field that was actually filled in.
fn provided(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Trim and lowercase an email address, rejecting obvious garbage.
fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::InvalidUsername(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(username.to_string())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let auth = service();
        let user = auth
            .register("ada", "Ada@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");

        let logged_in = auth.login("ADA@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.login("ada@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let auth = service();
        auth.register("ada", "ada@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        assert!(matches!(
            auth.register("ada", "ada@example.com", "password123", UserRole::Customer)
                .await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_uses_stored_role() {
        let auth = service();
        let user = auth
            .register("ada", "ada@example.com", "password123", UserRole::Admin)
            .await
            .unwrap();
        auth.set_role("ada@example.com", UserRole::Customer)
            .await
            .unwrap();

        let claims = Claims {
            sub: user.id,
            role: UserRole::Admin,
            exp: i64::MAX,
        };
        let current = auth.authenticate(&claims).await.unwrap();
        assert!(!current.is_admin());
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let claims = Claims {
            sub: UserId::generate(),
            role: UserRole::Customer,
            exp: i64::MAX,
        };
        assert!(matches!(
            service().authenticate(&claims).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let auth = service();
        let user = auth
            .register("ada", "ada@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();

        let updated = auth
            .update_profile(user.id, Some("lovelace"), Some(""), Some("new password"))
            .await
            .unwrap();
        assert_eq!(updated.username, "lovelace");
        assert_eq!(updated.email, "ada@example.com");

        assert!(auth.login("ada@example.com", "new password").await.is_ok());
        assert!(matches!(
            auth.login("ada@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));

        assert!(matches!(
            auth.update_profile(user.id, None, None, Some("short")).await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_conflict_and_role() {
        let auth = service();
        let ada = auth
            .register("ada", "ada@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        auth.register("bob", "bob@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();

        assert!(matches!(
            auth.update_user(ada.id, None, Some("BOB@example.com"), None).await,
            Err(AuthError::UserAlreadyExists)
        ));

        let promoted = auth
            .update_user(ada.id, None, None, Some(UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(promoted.role, UserRole::Admin);
        assert_eq!(promoted.email, "ada@example.com");

        assert!(matches!(
            auth.update_user(UserId::generate(), Some("x"), None, None).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let auth = service();
        let admin = auth
            .register("root", "root@example.com", "password123", UserRole::Admin)
            .await
            .unwrap();
        let ada = auth
            .register("ada", "ada@example.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        let actor = CurrentUser::from(&admin);

        assert!(matches!(
            auth.delete_user(admin.id, &actor).await,
            Err(AuthError::SelfDeletion)
        ));

        auth.delete_user(ada.id, &actor).await.unwrap();
        assert_eq!(auth.list_users().await.unwrap().len(), 1);
        assert!(matches!(
            auth.delete_user(ada.id, &actor).await,
            Err(AuthError::UserNotFound)
        ));

        let claims = Claims {
            sub: ada.id,
            role: UserRole::Customer,
            exp: i64::MAX,
        };
        assert!(matches!(
            auth.authenticate(&claims).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
