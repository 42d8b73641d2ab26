use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::dto::{Quantity, RecipeData, RecipeIngredientInput, RecipeToolInput, StepInput};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub difficulty: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub category: String,
    pub sub_categories: Vec<String>,
    pub image_urls: Vec<String>,
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IngredientLine {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    #[sqlx(flatten)]
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ToolLine {
    pub tool_id: i64,
    pub tool_name: String,
    #[sqlx(flatten)]
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Step {
    pub step_number: i32,
    pub title: String,
    pub description: String,
}

/// Recipe header with its resolved associations.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<IngredientLine>,
    pub tools: Vec<ToolLine>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeSummary {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub difficulty: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub image_urls: Vec<String>,
    pub is_public: bool,
    pub average_rating: f64,
}

const RECIPE_COLUMNS: &str = "id, user_id, name, description, difficulty, prep_time, cook_time, \
     servings, category, sub_categories, image_urls, is_public, created_at, updated_at";

// --- composite writes ---

pub async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    data: &RecipeData,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO recipes (user_id, name, description, difficulty, prep_time, cook_time,
                             servings, category, sub_categories, image_urls, is_public)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&data.name)
    .bind(&data.description)
    .bind(data.difficulty.as_str())
    .bind(data.prep_time)
    .bind(data.cook_time)
    .bind(data.servings)
    .bind(&data.category)
    .bind(&data.sub_categories)
    .bind(&data.image_urls)
    .bind(data.is_public)
    .fetch_one(&mut **tx)
    .await
    .context("insert recipe")?;
    Ok(id)
}

/// Overwrites the header when `user_id` owns it. Returns false when nothing matched.
pub async fn update_header(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    user_id: i64,
    data: &RecipeData,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE recipes SET
            name = $3, description = $4, difficulty = $5, prep_time = $6, cook_time = $7,
            servings = $8, category = $9, sub_categories = $10, image_urls = $11,
            is_public = $12, updated_at = now()
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(&data.name)
    .bind(&data.description)
    .bind(data.difficulty.as_str())
    .bind(data.prep_time)
    .bind(data.cook_time)
    .bind(data.servings)
    .bind(&data.category)
    .bind(&data.sub_categories)
    .bind(&data.image_urls)
    .bind(data.is_public)
    .execute(&mut **tx)
    .await
    .context("update recipe")?;
    Ok(res.rows_affected() > 0)
}

pub async fn insert_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    items: &[RecipeIngredientInput],
) -> anyhow::Result<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredient (recipe_id, ingredient_id, amount, unit)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(recipe_id)
        .bind(item.ingredient_id)
        .bind(item.quantity.amount)
        .bind(&item.quantity.unit)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert recipe ingredient {}", item.ingredient_id))?;
    }
    Ok(())
}

pub async fn insert_tools(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    items: &[RecipeToolInput],
) -> anyhow::Result<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO recipe_tool (recipe_id, tool_id, amount, unit)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(recipe_id)
        .bind(item.tool_id)
        .bind(item.quantity.amount)
        .bind(&item.quantity.unit)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert recipe tool {}", item.tool_id))?;
    }
    Ok(())
}

pub async fn insert_steps(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    steps: &[StepInput],
) -> anyhow::Result<()> {
    for step in steps {
        sqlx::query(
            r#"
            INSERT INTO steps (recipe_id, step_number, title, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(recipe_id)
        .bind(step.step_number)
        .bind(&step.title)
        .bind(&step.description)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert step {}", step.step_number))?;
    }
    Ok(())
}

/// Removes ingredient, tool and step rows of a recipe.
pub async fn delete_associations(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
) -> anyhow::Result<()> {
    for table in ["recipe_ingredient", "recipe_tool", "steps"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(recipe_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("delete {table} rows"))?;
    }
    Ok(())
}

pub async fn delete_ratings(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
) -> anyhow::Result<()> {
    // replies first, they reference their parent
    sqlx::query("DELETE FROM recipe_rating WHERE recipe_id = $1 AND reply_id IS NOT NULL")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete recipe rating replies")?;
    sqlx::query("DELETE FROM recipe_rating WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete recipe ratings")?;
    Ok(())
}

pub async fn delete_header(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    user_id: i64,
) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(recipe_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .context("delete recipe")?;
    Ok(res.rows_affected() > 0)
}

pub async fn is_owned_by(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    user_id: i64,
) -> anyhow::Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(recipe_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await
            .context("check recipe owner")?;
    Ok(row.is_some())
}

// --- single-field edits, all owner scoped ---

pub async fn change_owner(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    user_id: i64,
    new_owner_id: i64,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "UPDATE recipes SET user_id = $3, updated_at = now() WHERE id = $1 AND user_id = $2",
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(new_owner_id)
    .execute(&mut **tx)
    .await
    .context("change recipe owner")?;
    Ok(res.rows_affected() > 0)
}

pub async fn change_visibility(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    user_id: i64,
    is_public: bool,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "UPDATE recipes SET is_public = $3, updated_at = now() WHERE id = $1 AND user_id = $2",
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(is_public)
    .execute(&mut **tx)
    .await
    .context("change recipe visibility")?;
    Ok(res.rows_affected() > 0)
}

pub async fn update_step(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    step: &StepInput,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE steps SET title = $3, description = $4
        WHERE recipe_id = $1 AND step_number = $2
        "#,
    )
    .bind(recipe_id)
    .bind(step.step_number)
    .bind(&step.title)
    .bind(&step.description)
    .execute(&mut **tx)
    .await
    .context("update step")?;
    Ok(res.rows_affected() > 0)
}

pub async fn update_ingredient_quantity(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    item: &RecipeIngredientInput,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE recipe_ingredient SET amount = $3, unit = $4
        WHERE recipe_id = $1 AND ingredient_id = $2
        "#,
    )
    .bind(recipe_id)
    .bind(item.ingredient_id)
    .bind(item.quantity.amount)
    .bind(&item.quantity.unit)
    .execute(&mut **tx)
    .await
    .context("update recipe ingredient")?;
    Ok(res.rows_affected() > 0)
}

pub async fn update_tool_quantity(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    item: &RecipeToolInput,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE recipe_tool SET amount = $3, unit = $4
        WHERE recipe_id = $1 AND tool_id = $2
        "#,
    )
    .bind(recipe_id)
    .bind(item.tool_id)
    .bind(item.quantity.amount)
    .bind(&item.quantity.unit)
    .execute(&mut **tx)
    .await
    .context("update recipe tool")?;
    Ok(res.rows_affected() > 0)
}

// --- reads ---

pub async fn get_details(db: &PgPool, recipe_id: i64) -> anyhow::Result<Option<RecipeDetails>> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
    ))
    .bind(recipe_id)
    .fetch_optional(db)
    .await
    .context("fetch recipe")?;
    let Some(recipe) = recipe else {
        return Ok(None);
    };

    let ingredients = sqlx::query_as::<_, IngredientLine>(
        r#"
        SELECT ri.ingredient_id, i.name AS ingredient_name, ri.amount, ri.unit
        FROM recipe_ingredient ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("fetch recipe ingredients")?;

    let tools = sqlx::query_as::<_, ToolLine>(
        r#"
        SELECT rt.tool_id, t.name AS tool_name, rt.amount, rt.unit
        FROM recipe_tool rt
        JOIN tools t ON t.id = rt.tool_id
        WHERE rt.recipe_id = $1
        ORDER BY rt.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("fetch recipe tools")?;

    let steps = sqlx::query_as::<_, Step>(
        r#"
        SELECT step_number, title, description
        FROM steps
        WHERE recipe_id = $1
        ORDER BY step_number
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("fetch recipe steps")?;

    Ok(Some(RecipeDetails {
        recipe,
        ingredients,
        tools,
        steps,
    }))
}

const SUMMARY_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.name, r.difficulty, r.prep_time, r.cook_time, r.image_urls,
           r.is_public, COALESCE(a.average, 0)::float8 AS average_rating
    FROM recipes r
    LEFT JOIN (
        SELECT recipe_id, AVG(rating) AS average
        FROM recipe_rating
        WHERE rating IS NOT NULL
        GROUP BY recipe_id
    ) a ON a.recipe_id = r.id
"#;

pub async fn list_newest(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<RecipeSummary>> {
    let rows = sqlx::query_as::<_, RecipeSummary>(&format!(
        "{SUMMARY_SELECT} ORDER BY r.id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list recipes")?;
    Ok(rows)
}

pub async fn list_by_owner(
    db: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<RecipeSummary>> {
    let rows = sqlx::query_as::<_, RecipeSummary>(&format!(
        "{SUMMARY_SELECT} WHERE r.user_id = $1 ORDER BY r.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list own recipes")?;
    Ok(rows)
}
