//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Responses carry a JSON
//! body `{"message": "..."}`; server-class errors are captured to Sentry first
//! and their details are never sent to the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, CartError, CheckoutError, OrderError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        const INTERNAL: &str = "Internal server error";

        match self {
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
                }
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "Not authorized, token failed".to_string(),
                ),
                AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired".to_string()),
                AuthError::UserAlreadyExists => {
                    (StatusCode::BAD_REQUEST, "User already exists".to_string())
                }
                AuthError::WeakPassword(msg) | AuthError::InvalidUsername(msg) => {
                    (StatusCode::BAD_REQUEST, msg.clone())
                }
                AuthError::InvalidEmail(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
                }
                AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
                AuthError::SelfDeletion => (
                    StatusCode::BAD_REQUEST,
                    "Cannot delete your own account".to_string(),
                ),
                AuthError::TokenSigning(_) | AuthError::PasswordHash | AuthError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            Self::Cart(err) => match err {
                CartError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CartError::Contention => (StatusCode::CONFLICT, err.to_string()),
                CartError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CheckoutError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            Self::Order(err) => match err {
                OrderError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
                OrderError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                OrderError::IllegalTransition { .. } | OrderError::Conflict(_) => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                OrderError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Item added", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
