use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Cart line joined with the product it points at.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub recipe_id: Option<i64>,
    pub tool_id: Option<i64>,
    pub ingredient_id: Option<i64>,
    pub title: String,
    pub price: i64,
    pub stock: i32,
    pub image_urls: Vec<String>,
}

/// Adds `quantity` to the user's line for the product, creating it if needed.
pub async fn add(db: &PgPool, user_id: i64, product_id: i64, quantity: i32) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO carts (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = carts.quantity + EXCLUDED.quantity
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(db)
    .await
    .context("add to cart")?;
    Ok(id)
}

pub async fn list_for_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<CartLine>> {
    let rows = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT c.id, c.user_id, c.product_id, c.quantity,
               p.recipe_id, p.tool_id, p.ingredient_id,
               p.title, p.price, p.stock, p.image_urls
        FROM carts c
        JOIN products p ON p.id = c.product_id
        WHERE c.user_id = $1
        ORDER BY c.id
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list cart")?;
    Ok(rows)
}

pub async fn set_quantity(db: &PgPool, user_id: i64, cart_id: i64, quantity: i32) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE carts SET quantity = $3 WHERE id = $1 AND user_id = $2")
        .bind(cart_id)
        .bind(user_id)
        .bind(quantity)
        .execute(db)
        .await
        .context("update cart quantity")?;
    Ok(res.rows_affected() > 0)
}

pub async fn remove(db: &PgPool, user_id: i64, cart_id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM carts WHERE id = $1 AND user_id = $2")
        .bind(cart_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete cart item")?;
    Ok(res.rows_affected() > 0)
}

pub async fn clear(db: &PgPool, user_id: i64) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await
        .context("clear cart")?;
    Ok(res.rows_affected())
}
