//! Cart route handlers.
//!
//! Every response is the caller's full cart as a JSON array of items.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{CartItem, ProductSnapshot};
use crate::state::AppState;

/// `GET /cart` - the caller's cart, `[]` if none.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<CartItem>>> {
    Ok(Json(state.carts().get(user.id).await?))
}

/// `POST /cart` - add a product snapshot.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<ProductSnapshot>, JsonRejection>,
) -> Result<Json<Vec<CartItem>>> {
    let Json(snapshot) = payload?;
    if snapshot.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Product name is required".to_string(),
        ));
    }

    let product_id = snapshot.product_id.to_string();
    let items = state.carts().add_item(user.id, snapshot).await?;
    add_breadcrumb("cart", "Item added", Some(&[("product_id", product_id.as_str())]));

    Ok(Json(items))
}

/// `DELETE /cart/{cart_id}` - remove one line.
#[instrument(skip(state, user, cart_id), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    cart_id: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<CartItem>>> {
    let Path(cart_id) = cart_id?;
    Ok(Json(state.carts().remove_item(user.id, &cart_id).await?))
}

/// `DELETE /cart` - delete the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<CartItem>>> {
    state.carts().clear(user.id).await?;
    Ok(Json(Vec::new()))
}
