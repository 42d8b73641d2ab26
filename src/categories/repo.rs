use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::dto::CategoryInput;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub parent_id: Option<i64>,
    pub level: i32,
}

/// Inserts a category one level below its parent (roots sit at level 0).
pub async fn insert(db: &PgPool, input: &CategoryInput) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO categories (name, description, parent_id, level)
        VALUES ($1, $2, $3,
                COALESCE((SELECT level + 1 FROM categories WHERE id = $3), 0))
        RETURNING id
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.parent_id)
    .fetch_one(db)
    .await
    .context("insert category")?;
    Ok(id)
}

pub async fn get(db: &PgPool, id: i64) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, parent_id, level FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("fetch category")?;
    Ok(row)
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, parent_id, level FROM categories ORDER BY level, id",
    )
    .fetch_all(db)
    .await
    .context("list categories")?;
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Missing,
    /// The new parent is the category itself or sits below it.
    Cycle,
}

/// Renames or re-parents a category, re-deriving the level of its whole subtree.
pub async fn update(db: &PgPool, id: i64, input: &CategoryInput) -> anyhow::Result<UpdateOutcome> {
    let mut tx = db.begin().await.context("begin category tx")?;

    // concurrent moves could otherwise close a loop between two subtrees
    sqlx::query("LOCK TABLE categories IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await
        .context("lock categories")?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("fetch category")?;
    if exists.is_none() {
        return Ok(UpdateOutcome::Missing);
    }

    if let Some(parent_id) = input.parent_id {
        let (cycle,): (bool,) = sqlx::query_as(
            r#"
            WITH RECURSIVE subtree (id) AS (
                SELECT $1::BIGINT
                UNION
                SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
            )
            SELECT EXISTS (SELECT 1 FROM subtree WHERE id = $2)
            "#,
        )
        .bind(id)
        .bind(parent_id)
        .fetch_one(&mut *tx)
        .await
        .context("check category ancestry")?;
        if cycle {
            return Ok(UpdateOutcome::Cycle);
        }
    }

    sqlx::query(
        r#"
        UPDATE categories SET
            name = $2,
            description = $3,
            parent_id = $4,
            level = COALESCE((SELECT level + 1 FROM categories WHERE id = $4), 0)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.parent_id)
    .execute(&mut *tx)
    .await
    .context("update category")?;

    sqlx::query(
        r#"
        WITH RECURSIVE tree (id, level) AS (
            SELECT id, level FROM categories WHERE id = $1
            UNION ALL
            SELECT c.id, t.level + 1 FROM categories c JOIN tree t ON c.parent_id = t.id
        )
        UPDATE categories SET level = tree.level
        FROM tree
        WHERE categories.id = tree.id AND categories.level <> tree.level
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("update descendant levels")?;

    tx.commit().await.context("commit category tx")?;
    Ok(UpdateOutcome::Updated)
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete category")?;
    Ok(res.rows_affected() > 0)
}
