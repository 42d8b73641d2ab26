use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::dto::CatalogItemInput;
use super::CatalogKind;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub sub_categories: Vec<String>,
    pub description: String,
    pub unit: Option<String>,
    pub image_urls: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str = "id, name, category, sub_categories, description, unit, image_urls, created_at";

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    kind: CatalogKind,
    item: &CatalogItemInput,
) -> anyhow::Result<i64> {
    let sql = format!(
        r#"
        INSERT INTO {} (name, category, sub_categories, description, unit, image_urls)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
        kind.table()
    );
    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.sub_categories)
        .bind(&item.description)
        .bind(&item.unit)
        .bind(&item.image_urls)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("insert into {}", kind.table()))?;
    Ok(id)
}

pub async fn get(db: &PgPool, kind: CatalogKind, id: i64) -> anyhow::Result<Option<CatalogItem>> {
    let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", kind.table());
    let item = sqlx::query_as::<_, CatalogItem>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .with_context(|| format!("fetch from {}", kind.table()))?;
    Ok(item)
}

pub async fn list(db: &PgPool, kind: CatalogKind) -> anyhow::Result<Vec<CatalogItem>> {
    let sql = format!("SELECT {COLUMNS} FROM {} ORDER BY id", kind.table());
    let items = sqlx::query_as::<_, CatalogItem>(&sql)
        .fetch_all(db)
        .await
        .with_context(|| format!("list {}", kind.table()))?;
    Ok(items)
}

/// Locks the row and returns its current name.
pub async fn lock_name(
    tx: &mut Transaction<'_, Postgres>,
    kind: CatalogKind,
    id: i64,
) -> anyhow::Result<Option<String>> {
    let sql = format!("SELECT name FROM {} WHERE id = $1 FOR UPDATE", kind.table());
    let row: Option<(String,)> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .with_context(|| format!("lock {} row", kind.table()))?;
    Ok(row.map(|(name,)| name))
}

pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    kind: CatalogKind,
    id: i64,
    item: &CatalogItemInput,
) -> anyhow::Result<bool> {
    let sql = format!(
        r#"
        UPDATE {} SET
            name = $2, category = $3, sub_categories = $4,
            description = $5, unit = $6, image_urls = $7
        WHERE id = $1
        "#,
        kind.table()
    );
    let res = sqlx::query(&sql)
        .bind(id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.sub_categories)
        .bind(&item.description)
        .bind(&item.unit)
        .bind(&item.image_urls)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("update {}", kind.table()))?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    kind: CatalogKind,
    id: i64,
) -> anyhow::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
    let res = sqlx::query(&sql)
        .bind(id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("delete from {}", kind.table()))?;
    Ok(res.rows_affected() > 0)
}
