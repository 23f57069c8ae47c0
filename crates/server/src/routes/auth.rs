//! Authentication route handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::{UserId, UserRole};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::User;
use crate::state::AppState;

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// `PUT /auth/profile` body. Empty fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `PUT /auth/{id}` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserEditForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

/// Plain confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Issued token plus the account it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// `POST /auth/register` - create a customer account and sign it in.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterForm>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let Json(form) = payload?;

    let user = state
        .auth()
        .register(&form.username, &form.email, &form.password, UserRole::Customer)
        .await?;
    let token = state.tokens().issue(user.id, user.role)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// `POST /auth/login` - exchange credentials for a token.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginForm>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(form) = payload?;

    let user = state.auth().login(&form.email, &form.password).await?;
    let token = state.tokens().issue(user.id, user.role)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// `GET /auth/me` - the caller's profile.
pub async fn me(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<User>> {
    Ok(Json(state.auth().get_user(user.id).await?))
}

/// `PUT /auth/profile` - update the caller's username, email or password.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<ProfileForm>, JsonRejection>,
) -> Result<Json<User>> {
    let Json(form) = payload?;

    let updated = state
        .auth()
        .update_profile(
            user.id,
            form.username.as_deref(),
            form.email.as_deref(),
            form.password.as_deref(),
        )
        .await?;
    Ok(Json(updated))
}

/// `GET /auth` - every account (admin).
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.auth().list_users().await?))
}

/// `PUT /auth/{id}` - edit another account's username, email or role (admin).
#[instrument(skip(state, admin, id, payload), fields(admin_id = %admin.id))]
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    id: std::result::Result<Path<UserId>, PathRejection>,
    payload: std::result::Result<Json<UserEditForm>, JsonRejection>,
) -> Result<Json<User>> {
    let Path(id) = id?;
    let Json(form) = payload?;

    let updated = state
        .auth()
        .update_user(id, form.username.as_deref(), form.email.as_deref(), form.role)
        .await?;
    Ok(Json(updated))
}

/// `DELETE /auth/{id}` - delete an account (admin).
#[instrument(skip(state, admin, id), fields(admin_id = %admin.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    id: std::result::Result<Path<UserId>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let Path(id) = id?;

    state.auth().delete_user(id, &admin).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
