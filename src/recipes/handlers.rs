use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::dto::{
    ChangeOwnerRequest, ChangeStatusRequest, IngredientEdit, IngredientSearchRequest,
    MessageResponse, NameQuery, Pagination, RecipeRequest, RecipeWriteResponse, StepEdit, ToolEdit,
};
use super::repo::{self, RecipeDetails};
use super::services::{self, RecipeEdit, Written};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    search::{IndexName, SearchQuery},
    state::AppState,
    validate::{search_term, Payload},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipe", post(create_recipe))
        .route(
            "/recipe/:id",
            get(get_recipe).put(replace_recipe).delete(delete_recipe),
        )
        .route("/list-recipe", get(list_recipes))
        .route("/my-recipes", get(my_recipes))
        .route("/recipe/owner", patch(change_owner))
        .route("/recipe/status", patch(change_status))
        .route("/recipe/:id/step", put(edit_step))
        .route("/recipe/:id/ingredient", put(edit_ingredient))
        .route("/recipe/:id/tool", put(edit_tool))
        .route("/recipes/search", get(search_by_name))
        .route("/recipes/search/ingredients", post(search_by_ingredients))
}

fn write_response(written: Written, message: &'static str) -> Json<RecipeWriteResponse> {
    Json(RecipeWriteResponse {
        recipe_id: written.recipe_id,
        message,
        indexed: written.indexed,
    })
}

#[instrument(skip(state, req))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<RecipeRequest>,
) -> ApiResult<(StatusCode, Json<RecipeWriteResponse>)> {
    let written = services::create_recipe(&state, user_id, &req).await?;
    Ok((
        StatusCode::CREATED,
        write_response(written, "Recipe created successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecipeDetails>> {
    repo::get_details(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

#[instrument(skip(state, req))]
pub async fn replace_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<RecipeRequest>,
) -> ApiResult<Json<RecipeWriteResponse>> {
    let written = services::replace_recipe(&state, user_id, id, &req).await?;
    Ok(write_response(written, "Recipe updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecipeWriteResponse>> {
    let written = services::delete_recipe(&state, user_id, id).await?;
    Ok(write_response(written, "Recipe deleted successfully"))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Value>> {
    let (limit, offset) = p.window();
    let recipes = repo::list_newest(&state.db, limit, offset).await?;
    Ok(Json(json!({ "recipes": recipes })))
}

#[instrument(skip(state))]
pub async fn my_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Value>> {
    let (limit, offset) = p.window();
    let recipes = repo::list_by_owner(&state.db, user_id, limit, offset).await?;
    Ok(Json(json!({ "recipes": recipes })))
}

#[instrument(skip(state))]
pub async fn change_owner(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<ChangeOwnerRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let written = services::edit_recipe(
        &state,
        user_id,
        req.recipe_id,
        RecipeEdit::Owner(req.new_owner_id),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Recipe owner changed successfully",
        indexed: written.indexed,
    }))
}

#[instrument(skip(state))]
pub async fn change_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(req): Payload<ChangeStatusRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let written = services::edit_recipe(
        &state,
        user_id,
        req.recipe_id,
        RecipeEdit::Visibility(req.is_public),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Recipe status changed successfully",
        indexed: written.indexed,
    }))
}

#[instrument(skip(state, req))]
pub async fn edit_step(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<StepEdit>,
) -> ApiResult<Json<RecipeWriteResponse>> {
    let written = services::edit_recipe(&state, user_id, id, RecipeEdit::Step(&req)).await?;
    Ok(write_response(written, "Step updated successfully"))
}

#[instrument(skip(state, req))]
pub async fn edit_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<IngredientEdit>,
) -> ApiResult<Json<RecipeWriteResponse>> {
    let written = services::edit_recipe(&state, user_id, id, RecipeEdit::Ingredient(&req)).await?;
    Ok(write_response(written, "Recipe ingredient updated successfully"))
}

#[instrument(skip(state, req))]
pub async fn edit_tool(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<ToolEdit>,
) -> ApiResult<Json<RecipeWriteResponse>> {
    let written = services::edit_recipe(&state, user_id, id, RecipeEdit::Tool(&req)).await?;
    Ok(write_response(written, "Recipe tool updated successfully"))
}

#[instrument(skip(state))]
pub async fn search_by_name(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Value>> {
    let term = search_term(q.name.as_deref())?;
    let query = SearchQuery::Match {
        field: "name",
        text: term.to_string(),
    };
    let hits = state.search.search(IndexName::Recipes, &query).await?;
    Ok(Json(json!({ "total": hits.total, "recipes": hits.documents })))
}

#[instrument(skip(state))]
pub async fn search_by_ingredients(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Payload(req): Payload<IngredientSearchRequest>,
) -> ApiResult<Json<Value>> {
    let query = SearchQuery::Terms {
        field: "ingredients.ingredient_id",
        values: req.ingredients,
    };
    let hits = state.search.search(IndexName::Recipes, &query).await?;
    Ok(Json(json!({ "total": hits.total, "recipes": hits.documents })))
}
