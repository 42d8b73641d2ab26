use serde_json::{json, Value};
use tracing::{info, warn};

use super::dto::RecipeRequest;
use super::repo::{self, RecipeDetails};
use crate::error::{ApiError, ApiResult};
use crate::search::{outbox, sync, IndexName, OutboxOp};
use crate::state::AppState;

/// Result of a committed write: what changed and whether the index has caught up.
#[derive(Debug, Clone, Copy)]
pub struct Written {
    pub recipe_id: i64,
    pub indexed: bool,
}

async fn after_commit(state: &AppState, recipe_id: i64, event_id: i64) -> Written {
    let indexed = sync::dispatch(state, &[event_id]).await;
    if !indexed {
        warn!(recipe_id, event_id, "recipe not indexed yet, left for relay");
    }
    Written { recipe_id, indexed }
}

/// Inserts the header and every association in one transaction.
pub async fn create_recipe(state: &AppState, user_id: i64, req: &RecipeRequest) -> ApiResult<Written> {
    let mut tx = state.db.begin().await?;

    let recipe_id = repo::insert_header(&mut tx, user_id, &req.recipe).await?;
    repo::insert_ingredients(&mut tx, recipe_id, &req.ingredients).await?;
    repo::insert_tools(&mut tx, recipe_id, &req.tools).await?;
    repo::insert_steps(&mut tx, recipe_id, &req.steps).await?;
    let event_id = outbox::enqueue(&mut tx, IndexName::Recipes, recipe_id, OutboxOp::Upsert).await?;

    tx.commit().await?;
    info!(recipe_id, user_id, "recipe created");
    Ok(after_commit(state, recipe_id, event_id).await)
}

/// Rewrites the header and replaces all three association sets.
pub async fn replace_recipe(
    state: &AppState,
    user_id: i64,
    recipe_id: i64,
    req: &RecipeRequest,
) -> ApiResult<Written> {
    let mut tx = state.db.begin().await?;

    if !repo::update_header(&mut tx, recipe_id, user_id, &req.recipe).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    repo::delete_associations(&mut tx, recipe_id).await?;
    repo::insert_ingredients(&mut tx, recipe_id, &req.ingredients).await?;
    repo::insert_tools(&mut tx, recipe_id, &req.tools).await?;
    repo::insert_steps(&mut tx, recipe_id, &req.steps).await?;
    let event_id = outbox::enqueue(&mut tx, IndexName::Recipes, recipe_id, OutboxOp::Upsert).await?;

    tx.commit().await?;
    info!(recipe_id, user_id, "recipe replaced");
    Ok(after_commit(state, recipe_id, event_id).await)
}

/// Deletes associations, ratings and the header. Zero header rows rolls everything back.
pub async fn delete_recipe(state: &AppState, user_id: i64, recipe_id: i64) -> ApiResult<Written> {
    let mut tx = state.db.begin().await?;

    if !repo::is_owned_by(&mut tx, recipe_id, user_id).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    repo::delete_associations(&mut tx, recipe_id).await?;
    repo::delete_ratings(&mut tx, recipe_id).await?;
    if !repo::delete_header(&mut tx, recipe_id, user_id).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    let event_id = outbox::enqueue(&mut tx, IndexName::Recipes, recipe_id, OutboxOp::Delete).await?;

    tx.commit().await?;
    info!(recipe_id, user_id, "recipe deleted");
    Ok(after_commit(state, recipe_id, event_id).await)
}

/// Single-row recipe edits that leave the aggregate otherwise intact.
pub enum RecipeEdit<'a> {
    Owner(i64),
    Visibility(bool),
    Step(&'a super::dto::StepEdit),
    Ingredient(&'a super::dto::IngredientEdit),
    Tool(&'a super::dto::ToolEdit),
}

pub async fn edit_recipe(
    state: &AppState,
    user_id: i64,
    recipe_id: i64,
    edit: RecipeEdit<'_>,
) -> ApiResult<Written> {
    let mut tx = state.db.begin().await?;

    let matched = match edit {
        RecipeEdit::Owner(new_owner) => {
            repo::change_owner(&mut tx, recipe_id, user_id, new_owner).await?
        }
        RecipeEdit::Visibility(is_public) => {
            repo::change_visibility(&mut tx, recipe_id, user_id, is_public).await?
        }
        RecipeEdit::Step(step) => {
            repo::is_owned_by(&mut tx, recipe_id, user_id).await?
                && repo::update_step(&mut tx, recipe_id, step).await?
        }
        RecipeEdit::Ingredient(item) => {
            repo::is_owned_by(&mut tx, recipe_id, user_id).await?
                && repo::update_ingredient_quantity(&mut tx, recipe_id, item).await?
        }
        RecipeEdit::Tool(item) => {
            repo::is_owned_by(&mut tx, recipe_id, user_id).await?
                && repo::update_tool_quantity(&mut tx, recipe_id, item).await?
        }
    };
    if !matched {
        return Err(ApiError::not_found("Recipe not found"));
    }
    let event_id = outbox::enqueue(&mut tx, IndexName::Recipes, recipe_id, OutboxOp::Upsert).await?;

    tx.commit().await?;
    Ok(after_commit(state, recipe_id, event_id).await)
}

/// Denormalised search document: header fields plus resolved ingredients, tools
/// and steps ordered by number.
pub fn recipe_document(details: &RecipeDetails) -> Value {
    let r = &details.recipe;
    let mut steps: Vec<_> = details.steps.iter().collect();
    steps.sort_by_key(|s| s.step_number);

    json!({
        "id": r.id,
        "user_id": r.user_id,
        "name": r.name,
        "description": r.description,
        "difficulty": r.difficulty,
        "prep_time": r.prep_time,
        "cook_time": r.cook_time,
        "servings": r.servings,
        "category": r.category,
        "sub_categories": r.sub_categories,
        "image_urls": r.image_urls,
        "is_public": r.is_public,
        "ingredients": details.ingredients.iter().map(|i| json!({
            "ingredient_id": i.ingredient_id,
            "ingredient_name": i.ingredient_name,
            "quantity": i.quantity,
        })).collect::<Vec<_>>(),
        "tools": details.tools.iter().map(|t| json!({
            "tool_id": t.tool_id,
            "tool_name": t.tool_name,
            "quantity": t.quantity,
        })).collect::<Vec<_>>(),
        "steps": steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::dto::Quantity;
    use crate::recipes::repo::{IngredientLine, Recipe, Step, ToolLine};
    use crate::search::memory::MemoryIndex;
    use sqlx::PgPool;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn details() -> RecipeDetails {
        let now = OffsetDateTime::UNIX_EPOCH;
        RecipeDetails {
            recipe: Recipe {
                id: 42,
                user_id: 7,
                name: "Shakshuka".into(),
                description: "eggs in tomato".into(),
                difficulty: "easy".into(),
                prep_time: 10,
                cook_time: 20,
                servings: 2,
                category: "breakfast".into(),
                sub_categories: vec!["eggs".into()],
                image_urls: vec![],
                is_public: true,
                created_at: now,
                updated_at: now,
            },
            ingredients: vec![IngredientLine {
                ingredient_id: 5,
                ingredient_name: "Egg".into(),
                quantity: Quantity { amount: 4.0, unit: None },
            }],
            tools: vec![ToolLine {
                tool_id: 9,
                tool_name: "Skillet".into(),
                quantity: Quantity { amount: 1.0, unit: Some("pcs".into()) },
            }],
            steps: vec![
                Step { step_number: 3, title: "Crack eggs".into(), description: String::new() },
                Step { step_number: 1, title: "Fry peppers".into(), description: String::new() },
            ],
        }
    }

    #[test]
    fn document_carries_ingredient_ids_and_names() {
        let doc = recipe_document(&details());
        assert_eq!(doc["id"], 42);
        assert_eq!(doc["ingredients"][0]["ingredient_id"], 5);
        assert_eq!(doc["ingredients"][0]["ingredient_name"], "Egg");
        assert_eq!(doc["ingredients"][0]["quantity"]["amount"], 4.0);
        assert_eq!(doc["tools"][0]["tool_name"], "Skillet");
        assert_eq!(doc["tools"][0]["quantity"]["unit"], "pcs");
    }

    #[test]
    fn document_steps_are_ordered_by_number() {
        let doc = recipe_document(&details());
        let numbers: Vec<i64> = doc["steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["step_number"].as_i64().unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    struct Kitchen {
        state: AppState,
        index: Arc<MemoryIndex>,
        ingredients: Vec<i64>,
        tool: i64,
    }

    async fn kitchen(db: PgPool) -> Kitchen {
        let ingredients: Vec<(i64,)> = sqlx::query_as(
            "INSERT INTO ingredients (name, category, unit) \
             VALUES ('Tomato', 'vegetable', 'g'), ('Basil', 'herb', 'g') RETURNING id",
        )
        .fetch_all(&db)
        .await
        .unwrap();
        let (tool,): (i64,) =
            sqlx::query_as("INSERT INTO tools (name, category) VALUES ('Knife', 'cutlery') RETURNING id")
                .fetch_one(&db)
                .await
                .unwrap();
        let index = Arc::new(MemoryIndex::default());
        Kitchen {
            state: AppState::with_pool(db, index.clone()),
            index,
            ingredients: ingredients.into_iter().map(|(id,)| id).collect(),
            tool,
        }
    }

    fn caprese(k: &Kitchen) -> RecipeRequest {
        serde_json::from_value(json!({
            "recipeData": {
                "name": "Caprese", "difficulty": "easy", "prep_time": 10,
                "cook_time": 0, "servings": 2, "category": "salad"
            },
            "recipeIngredientData": [
                { "ingredient_id": k.ingredients[0], "quantity": { "amount": 300, "unit": "g" } },
                { "ingredient_id": k.ingredients[1], "quantity": 5 }
            ],
            "recipeToolData": [ { "tool_id": k.tool, "quantity": 1 } ],
            "stepsData": [
                { "step_number": 1, "title": "Slice tomatoes" },
                { "step_number": 2, "title": "Add basil" },
                { "step_number": 3, "title": "Season" }
            ]
        }))
        .unwrap()
    }

    async fn pending_events(db: &PgPool) -> Vec<(i32, Option<String>)> {
        sqlx::query_as("SELECT attempts, last_error FROM search_outbox ORDER BY id")
            .fetch_all(db)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn created_recipe_reads_back_whole(db: PgPool) {
        let k = kitchen(db).await;
        let written = create_recipe(&k.state, 7, &caprese(&k)).await.unwrap();
        assert!(written.indexed);

        let details = repo::get_details(&k.state.db, written.recipe_id).await.unwrap().unwrap();
        assert_eq!(details.recipe.user_id, 7);
        let mut ids: Vec<i64> = details.ingredients.iter().map(|i| i.ingredient_id).collect();
        ids.sort();
        let mut expected = k.ingredients.clone();
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(details.tools.len(), 1);
        assert_eq!(details.tools[0].tool_name, "Knife");
        assert_eq!(details.steps.len(), 3);

        let doc = k.index.get(IndexName::Recipes, written.recipe_id).unwrap();
        assert_eq!(doc["name"], "Caprese");
        assert_eq!(doc["ingredients"].as_array().unwrap().len(), 2);
        assert!(pending_events(&k.state.db).await.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn replace_swaps_every_association(db: PgPool) {
        let k = kitchen(db).await;
        let id = create_recipe(&k.state, 7, &caprese(&k)).await.unwrap().recipe_id;

        let mut smaller = caprese(&k);
        smaller.recipe.name = "Tomato salad".into();
        smaller.ingredients.truncate(1);
        smaller.tools.clear();
        smaller.steps.truncate(1);
        let written = replace_recipe(&k.state, 7, id, &smaller).await.unwrap();
        assert_eq!(written.recipe_id, id);

        let details = repo::get_details(&k.state.db, id).await.unwrap().unwrap();
        assert_eq!(details.recipe.name, "Tomato salad");
        assert_eq!(details.ingredients.len(), 1);
        assert!(details.tools.is_empty());
        assert_eq!(details.steps.len(), 1);
        assert_eq!(k.index.get(IndexName::Recipes, id).unwrap()["name"], "Tomato salad");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn other_users_cannot_touch_the_recipe(db: PgPool) {
        let k = kitchen(db).await;
        let id = create_recipe(&k.state, 7, &caprese(&k)).await.unwrap().recipe_id;

        let err = replace_recipe(&k.state, 8, id, &caprese(&k)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = delete_recipe(&k.state, 8, id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = edit_recipe(&k.state, 8, id, RecipeEdit::Visibility(true)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let details = repo::get_details(&k.state.db, id).await.unwrap().unwrap();
        assert_eq!(details.recipe.user_id, 7);
        assert!(!details.recipe.is_public);
        assert_eq!(details.ingredients.len(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deleted_recipe_is_gone_from_store_and_index(db: PgPool) {
        let k = kitchen(db).await;
        let id = create_recipe(&k.state, 7, &caprese(&k)).await.unwrap().recipe_id;
        assert!(k.index.get(IndexName::Recipes, id).is_some());

        let written = delete_recipe(&k.state, 7, id).await.unwrap();
        assert!(written.indexed);
        assert!(repo::get_details(&k.state.db, id).await.unwrap().is_none());
        assert!(k.index.get(IndexName::Recipes, id).is_none());

        let err = delete_recipe(&k.state, 7, id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn index_outage_still_commits_the_recipe(db: PgPool) {
        let k = kitchen(db).await;
        k.index.set_fail_writes(true);

        let written = create_recipe(&k.state, 7, &caprese(&k)).await.unwrap();
        assert!(!written.indexed);
        assert!(repo::get_details(&k.state.db, written.recipe_id).await.unwrap().is_some());
        assert!(k.index.get(IndexName::Recipes, written.recipe_id).is_none());

        let pending = pending_events(&k.state.db).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, 1);
        assert!(pending[0].1.as_deref().unwrap().contains("index unavailable"));
    }
}
