//! Order history route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};

use shopfront_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::HistoryEntryView;
use crate::state::AppState;

/// `GET /order-history/{order_id}` - status changes, oldest first (admin).
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    order_id: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Vec<HistoryEntryView>>> {
    let Path(order_id) = order_id?;
    Ok(Json(state.orders().history(order_id, &user).await?))
}
