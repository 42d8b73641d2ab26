use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Map, Value};
use tracing::instrument;

use super::dto::{validate_batch, BulkCreatedResponse, CatalogItemInput, CreatedResponse, UpdatedResponse};
use super::{repo, services, CatalogKind};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    recipes::dto::NameQuery,
    search::SearchQuery,
    state::AppState,
    validate::{search_term, Payload},
};

/// Routes for one catalog; the kind reaches handlers as an extension.
pub fn routes(kind: CatalogKind) -> Router<AppState> {
    let one = kind.singular();
    let many = kind.plural();
    Router::new()
        .route(&format!("/{one}"), post(create_item))
        .route(&format!("/list-{one}"), post(create_items))
        .route(
            &format!("/{one}/:id"),
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(&format!("/{many}"), get(list_items))
        .route(&format!("/{many}/search"), get(search_items))
}

#[instrument(skip(state, item))]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
    Payload(item): Payload<CatalogItemInput>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    item.validate_for(kind)?;
    let (id, indexed) = services::create(&state, kind, &item).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: format!("{} created successfully", kind.noun()),
            indexed,
        }),
    ))
}

#[instrument(skip(state, items))]
pub async fn create_items(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
    Payload(items): Payload<Vec<CatalogItemInput>>,
) -> Response {
    if let Err(e) = validate_batch(kind, &items) {
        return e.into_response();
    }

    let outcome = services::create_many(&state, kind, &items).await;
    match outcome.failure {
        None => (
            StatusCode::CREATED,
            Json(BulkCreatedResponse {
                message: format!("{} items created successfully", outcome.created_ids.len()),
                ids: outcome.created_ids,
                indexed: outcome.indexed,
            }),
        )
            .into_response(),
        Some((failed_index, err)) => (
            err.status(),
            Json(json!({
                "error": err.public_message(),
                "created_ids": outcome.created_ids,
                "failed_index": failed_index,
                "indexed": outcome.indexed,
            })),
        )
            .into_response(),
    }
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<repo::CatalogItem>> {
    repo::get(&state.db, kind, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.noun())))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Json<Vec<repo::CatalogItem>>> {
    Ok(Json(repo::list(&state.db, kind).await?))
}

#[instrument(skip(state, item))]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(item): Payload<CatalogItemInput>,
) -> ApiResult<Json<UpdatedResponse>> {
    item.validate_for(kind)?;
    let indexed = services::update(&state, kind, id, &item).await?;
    Ok(Json(UpdatedResponse {
        message: format!("{} updated successfully", kind.noun()),
        indexed,
    }))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UpdatedResponse>> {
    let indexed = services::delete(&state, kind, id).await?;
    Ok(Json(UpdatedResponse {
        message: format!("{} deleted successfully", kind.noun()),
        indexed,
    }))
}

#[instrument(skip(state))]
pub async fn search_items(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Value>> {
    let term = search_term(q.name.as_deref())?;
    let query = SearchQuery::Match {
        field: "name",
        text: term.to_string(),
    };
    let hits = state.search.search(kind.index(), &query).await?;

    let mut body = Map::new();
    body.insert("total".into(), hits.total.into());
    body.insert(kind.plural().into(), Value::Array(hits.documents));
    Ok(Json(Value::Object(body)))
}
