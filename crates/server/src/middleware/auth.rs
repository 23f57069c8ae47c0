//! Authentication extractors.
//!
//! Protected handlers take [`RequireUser`] or [`RequireAdmin`]. Both read an
//! `Authorization: Bearer <token>` header, verify the token and re-load the
//! user, so role changes take effect on the next request.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::AuthError;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_cart(
///     State(state): State<AppState>,
///     RequireUser(user): RequireUser,
/// ) -> Result<Json<Vec<CartItem>>> {
///     Ok(Json(state.carts().get(user.id).await?))
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let claims = state.tokens().verify(token)?;
        let user = state.auth().authenticate(&claims).await.map_err(|e| match e {
            AuthError::Repository(inner) => AppError::Database(inner),
            other => AppError::Auth(other),
        })?;

        set_sentry_user(&user.id, &user.username);
        Ok(Self(user))
    }
}

/// Extractor that requires a valid bearer token from an admin.
///
/// Missing or invalid tokens are rejected with 401, non-admins with 403.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::Forbidden(
                "Not authorized as an admin".to_string(),
            ));
        }

        Ok(Self(user))
    }
}

/// Token from an `Authorization: Bearer ...` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/cart");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
