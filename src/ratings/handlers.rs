use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::dto::{RatingInput, RatingUpdate, ReplyInput};
use super::{repo, RatingTarget};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Payload,
};

pub fn routes(target: RatingTarget) -> Router<AppState> {
    let seg = target.segment();
    Router::new()
        .route(&format!("/{seg}-rating"), post(create_rating))
        .route(&format!("/{seg}-rating/:id/reply"), post(reply_to_rating))
        .route(
            &format!("/{seg}-rating/:id"),
            put(update_rating).delete(delete_rating),
        )
        .route(&format!("/{seg}/:id/ratings"), get(list_ratings))
        .route(&format!("/{seg}/:id/average-rating"), get(average_rating))
}

fn missing(target: RatingTarget) -> ApiError {
    ApiError::not_found(format!("{} not found", target.noun()))
}

#[instrument(skip(state))]
pub async fn create_rating(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<RatingInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let id = repo::insert(&state.db, target, user_id, &req).await?;
    info!(table = target.table(), id, subject_id = req.subject_id, "rating created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": format!("{} created successfully", target.noun()) })),
    ))
}

#[instrument(skip(state))]
pub async fn reply_to_rating(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(user_id): AuthUser,
    Path(parent_id): Path<i64>,
    Payload(req): Payload<ReplyInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let parent = repo::get(&state.db, target, parent_id)
        .await?
        .ok_or_else(|| missing(target))?;
    if parent.reply_id.is_some() {
        return Err(ApiError::validation("Cannot reply to a reply"));
    }
    let id = repo::insert_reply(&state.db, target, user_id, &parent, &req.comment).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": "Reply added" })),
    ))
}

#[instrument(skip(state))]
pub async fn update_rating(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<RatingUpdate>,
) -> ApiResult<Json<Value>> {
    if !repo::update(&state.db, target, id, user_id, &req).await? {
        return Err(missing(target));
    }
    Ok(Json(json!({ "message": format!("{} updated successfully", target.noun()) })))
}

#[instrument(skip(state))]
pub async fn delete_rating(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.begin().await?;
    if !repo::delete(&mut tx, target, id, user_id).await? {
        return Err(missing(target));
    }
    tx.commit().await?;
    Ok(Json(json!({ "message": format!("{} deleted successfully", target.noun()) })))
}

#[instrument(skip(state))]
pub async fn list_ratings(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(_user_id): AuthUser,
    Path(subject_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let ratings: Vec<Value> = repo::list_for_subject(&state.db, target, subject_id)
        .await?
        .iter()
        .map(|r| r.to_json(target))
        .collect();
    Ok(Json(json!({ "ratings": ratings })))
}

#[instrument(skip(state))]
pub async fn average_rating(
    State(state): State<AppState>,
    Extension(target): Extension<RatingTarget>,
    AuthUser(_user_id): AuthUser,
    Path(subject_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let average = repo::average(&state.db, target, subject_id).await?;
    Ok(Json(json!({
        (target.subject_column()): subject_id,
        "average_rating": average,
    })))
}
