use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::dto::{Backing, ProductFields, ProductInput, ProductWriteResponse};
use super::repo::{self, Product};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    recipes::dto::NameQuery,
    search::{outbox, sync, IndexName, OutboxOp, SearchQuery},
    state::AppState,
    validate::{search_term, Payload},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/product", post(create_product))
        .route(
            "/product/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products", get(list_products))
        .route("/my-products", get(my_products))
        .route("/products/search", get(search_products))
        .route("/products/recipe/:id", get(products_for_recipe))
        .route("/products/tool/:id", get(products_for_tool))
        .route("/products/ingredient/:id", get(products_for_ingredient))
}

fn not_found() -> ApiError {
    ApiError::not_found("Product not found")
}

#[instrument(skip(state, req))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<ProductInput>,
) -> ApiResult<(StatusCode, Json<ProductWriteResponse>)> {
    let backing = req.backing()?;

    let mut tx = state.db.begin().await?;
    let id = repo::insert(&mut tx, user_id, backing, &req.fields).await?;
    let event_id = outbox::enqueue(&mut tx, IndexName::Products, id, OutboxOp::Upsert).await?;
    tx.commit().await?;
    info!(product_id = id, seller_id = user_id, ?backing, "product created");

    let indexed = sync::dispatch(&state, &[event_id]).await;
    Ok((
        StatusCode::CREATED,
        Json(ProductWriteResponse {
            id,
            message: "Product created successfully",
            indexed,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Product>> {
    repo::get(&state.db, id).await?.map(Json).ok_or_else(not_found)
}

#[instrument(skip(state, fields))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(fields): Payload<ProductFields>,
) -> ApiResult<Json<ProductWriteResponse>> {
    let mut tx = state.db.begin().await?;
    if !repo::update(&mut tx, id, user_id, &fields).await? {
        return Err(not_found());
    }
    let event_id = outbox::enqueue(&mut tx, IndexName::Products, id, OutboxOp::Upsert).await?;
    tx.commit().await?;

    let indexed = sync::dispatch(&state, &[event_id]).await;
    Ok(Json(ProductWriteResponse {
        id,
        message: "Product updated successfully",
        indexed,
    }))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductWriteResponse>> {
    let mut tx = state.db.begin().await?;
    if !repo::delete(&mut tx, id, user_id).await? {
        return Err(not_found());
    }
    let event_id = outbox::enqueue(&mut tx, IndexName::Products, id, OutboxOp::Delete).await?;
    tx.commit().await?;

    let indexed = sync::dispatch(&state, &[event_id]).await;
    Ok(Json(ProductWriteResponse {
        id,
        message: "Product deleted successfully",
        indexed,
    }))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(repo::list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn my_products(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(repo::list_by_seller(&state.db, user_id).await?))
}

async fn by_backing(state: &AppState, backing: Backing) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(repo::list_by_backing(&state.db, backing).await?))
}

#[instrument(skip(state))]
pub async fn products_for_recipe(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Product>>> {
    by_backing(&state, Backing::Recipe(id)).await
}

#[instrument(skip(state))]
pub async fn products_for_tool(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Product>>> {
    by_backing(&state, Backing::Tool(id)).await
}

#[instrument(skip(state))]
pub async fn products_for_ingredient(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Product>>> {
    by_backing(&state, Backing::Ingredient(id)).await
}

#[instrument(skip(state))]
pub async fn search_products(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Value>> {
    let term = search_term(q.name.as_deref())?;
    let query = SearchQuery::Match {
        field: "title",
        text: term.to_string(),
    };
    let hits = state.search.search(IndexName::Products, &query).await?;
    Ok(Json(json!({ "total": hits.total, "products": hits.documents })))
}
