use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::dto::{Backing, ProductFields};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub recipe_id: Option<i64>,
    pub tool_id: Option<i64>,
    pub ingredient_id: Option<i64>,
    pub title: String,
    pub description: String,
    /// Minor currency units.
    pub price: i64,
    pub stock: i32,
    pub image_urls: Vec<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str = "id, seller_id, recipe_id, tool_id, ingredient_id, title, description, \
     price, stock, image_urls, is_active, created_at";

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    seller_id: i64,
    backing: Backing,
    fields: &ProductFields,
) -> anyhow::Result<i64> {
    let (recipe_id, tool_id, ingredient_id) = backing.columns();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO products (seller_id, recipe_id, tool_id, ingredient_id, title,
                              description, price, stock, image_urls, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(seller_id)
    .bind(recipe_id)
    .bind(tool_id)
    .bind(ingredient_id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(fields.stock)
    .bind(&fields.image_urls)
    .bind(fields.is_active)
    .fetch_one(&mut **tx)
    .await
    .context("insert product")?;
    Ok(id)
}

pub async fn get(db: &PgPool, id: i64) -> anyhow::Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("fetch product")?;
    Ok(product)
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products ORDER BY id DESC"
    ))
    .fetch_all(db)
    .await
    .context("list products")?;
    Ok(rows)
}

pub async fn list_by_seller(db: &PgPool, seller_id: i64) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products WHERE seller_id = $1 ORDER BY id DESC"
    ))
    .bind(seller_id)
    .fetch_all(db)
    .await
    .context("list seller products")?;
    Ok(rows)
}

pub async fn list_by_backing(db: &PgPool, backing: Backing) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products WHERE {} = $1 ORDER BY id DESC",
        backing.column()
    ))
    .bind(backing.id())
    .fetch_all(db)
    .await
    .with_context(|| format!("list products by {}", backing.column()))?;
    Ok(rows)
}

pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    seller_id: i64,
    fields: &ProductFields,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE products SET
            title = $3, description = $4, price = $5, stock = $6,
            image_urls = $7, is_active = $8
        WHERE id = $1 AND seller_id = $2
        "#,
    )
    .bind(id)
    .bind(seller_id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(fields.stock)
    .bind(&fields.image_urls)
    .bind(fields.is_active)
    .execute(&mut **tx)
    .await
    .context("update product")?;
    Ok(res.rows_affected() > 0)
}

/// Removes the product together with its cart lines and ratings, if `seller_id` owns it.
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    seller_id: i64,
) -> anyhow::Result<bool> {
    let owned: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 AND seller_id = $2 FOR UPDATE")
            .bind(id)
            .bind(seller_id)
            .fetch_optional(&mut **tx)
            .await
            .context("lock product")?;
    if owned.is_none() {
        return Ok(false);
    }

    for sql in [
        "DELETE FROM carts WHERE product_id = $1",
        "DELETE FROM product_rating WHERE product_id = $1 AND reply_id IS NOT NULL",
        "DELETE FROM product_rating WHERE product_id = $1",
        "DELETE FROM products WHERE id = $1",
    ] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("delete product")?;
    }
    Ok(true)
}
