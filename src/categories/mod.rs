//! Recipe categories. Not mirrored into the search index.

mod dto;
mod repo;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use self::dto::CategoryInput;
use self::repo::{Category, UpdateOutcome};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Payload,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/category", post(create_category))
        .route("/categories", get(list_categories))
        .route(
            "/category/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

fn missing() -> ApiError {
    ApiError::not_found("Category not found")
}

#[instrument(skip(state))]
async fn create_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let id = repo::insert(&state.db, &req).await?;
    info!(category_id = id, "category created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": "Category created successfully" })),
    ))
}

#[instrument(skip(state))]
async fn get_category(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    repo::get(&state.db, id).await?.map(Json).ok_or_else(missing)
}

#[instrument(skip(state))]
async fn list_categories(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(repo::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn update_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<CategoryInput>,
) -> ApiResult<Json<Value>> {
    match repo::update(&state.db, id, &req).await? {
        UpdateOutcome::Updated => {
            Ok(Json(json!({ "message": "Category updated successfully" })))
        }
        UpdateOutcome::Missing => Err(missing()),
        UpdateOutcome::Cycle => Err(ApiError::validation(
            "a category cannot be its own parent or ancestor",
        )),
    }
}

#[instrument(skip(state))]
async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !repo::delete(&state.db, id).await? {
        return Err(missing());
    }
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
