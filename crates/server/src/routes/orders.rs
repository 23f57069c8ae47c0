//! Order route handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus, UserId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::OrderView;
use crate::services::CheckoutRequest;
use crate::state::AppState;

/// `PUT /orders/status/{id}` body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// `POST /orders` - place an order, then clear the caller's cart.
///
/// The order stands even if clearing the cart fails.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let Json(request) = payload?;

    let order = state.checkout().checkout(user.id, &request).await?;
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", order.id.to_string().as_str())]),
    );

    if let Err(e) = state.carts().clear(user.id).await {
        tracing::warn!(order_id = %order.id, error = %e, "Order placed but cart not cleared");
    }

    let view = state.orders().get(order.id, &user).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /orders` - every order (admin).
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> Result<Json<Vec<OrderView>>> {
    Ok(Json(state.orders().all(&user).await?))
}

/// `GET /orders/user/{id}` - one user's orders (that user or an admin).
#[instrument(skip(state, user, owner), fields(user_id = %user.id))]
pub async fn for_user(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    owner: std::result::Result<Path<UserId>, PathRejection>,
) -> Result<Json<Vec<OrderView>>> {
    let Path(owner) = owner?;
    Ok(Json(state.orders().for_user(owner, &user).await?))
}

/// `GET /orders/{id}` - one order (owner or admin).
#[instrument(skip(state, user, order_id), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    order_id: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<Json<OrderView>> {
    let Path(order_id) = order_id?;
    Ok(Json(state.orders().get(order_id, &user).await?))
}

/// `PUT /orders/status/{id}` - move an order along its lifecycle (admin).
#[instrument(skip(state, user, order_id, payload), fields(user_id = %user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    order_id: std::result::Result<Path<OrderId>, PathRejection>,
    payload: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<OrderView>> {
    let Path(order_id) = order_id?;
    let Json(update) = payload?;
    let target: OrderStatus = update.status.parse().map_err(AppError::BadRequest)?;

    state.orders().transition(order_id, target, &user).await?;
    Ok(Json(state.orders().get(order_id, &user).await?))
}

/// `GET /orders/{id}/transitions` - statuses the order may move to (admin).
pub async fn transitions(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    order_id: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Vec<OrderStatus>>> {
    let Path(order_id) = order_id?;
    Ok(Json(state.orders().allowed_transitions(order_id, &user).await?))
}
