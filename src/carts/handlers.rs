use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::dto::{AddToCart, CartMessage, UpdateQuantity};
use super::repo::{self, CartLine};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Payload,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", post(add_to_cart))
        .route("/carts", axum::routing::get(list_cart).delete(clear_cart))
        .route("/cart/:id", put(update_quantity).delete(remove_item))
}

fn missing() -> ApiError {
    ApiError::not_found("Cart item not found")
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<AddToCart>,
) -> ApiResult<Json<Value>> {
    let id = repo::add(&state.db, user_id, req.product_id, req.quantity).await?;
    Ok(Json(json!({
        "id": id,
        "message": "Product added to cart successfully",
    })))
}

#[instrument(skip(state))]
pub async fn list_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<CartLine>>> {
    Ok(Json(repo::list_for_user(&state.db, user_id).await?))
}

#[instrument(skip(state))]
pub async fn update_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<UpdateQuantity>,
) -> ApiResult<Json<CartMessage>> {
    if !repo::set_quantity(&state.db, user_id, id, req.quantity).await? {
        return Err(missing());
    }
    Ok(Json(CartMessage {
        message: "Cart quantity updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CartMessage>> {
    if !repo::remove(&state.db, user_id, id).await? {
        return Err(missing());
    }
    Ok(Json(CartMessage {
        message: "Cart item deleted successfully",
    }))
}

#[instrument(skip(state))]
pub async fn clear_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<CartMessage>> {
    let removed = repo::clear(&state.db, user_id).await?;
    debug!(user_id, removed, "cart cleared");
    Ok(Json(CartMessage {
        message: "All cart items cleared successfully",
    }))
}
