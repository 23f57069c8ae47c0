//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// Username empty or too long.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Unknown email or wrong password; the two are not distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or username already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No account for the given id or email.
    #[error("user not found")]
    UserNotFound,

    /// Password shorter than the minimum length.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// An admin tried to delete their own account.
    #[error("cannot delete your own account")]
    SelfDeletion,

    /// Bearer token missing, malformed, or badly signed.
    #[error("invalid token")]
    InvalidToken,

    /// Bearer token past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Token could not be produced.
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    /// Storage failure while loading or saving an account.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Argon2 hashing or PHC parsing failed.
    #[error("password hashing error")]
    PasswordHash,
}
