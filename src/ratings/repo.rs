use anyhow::Context;
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use super::dto::{RatingInput, RatingUpdate};
use super::RatingTarget;

#[derive(Debug, Clone, FromRow)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: i64,
    pub rating: Option<f64>,
    pub comment: String,
    pub reply_id: Option<i64>,
    pub created_at: OffsetDateTime,
}

impl Rating {
    /// JSON with the subject under its real column name.
    pub fn to_json(&self, target: RatingTarget) -> Value {
        let mut v = json!({
            "id": self.id,
            "user_id": self.user_id,
            "rating": self.rating,
            "comment": self.comment,
            "reply_id": self.reply_id,
            "created_at": self
                .created_at
                .format(&time::format_description::well_known::Rfc3339)
                .ok(),
        });
        v[target.subject_column()] = json!(self.subject_id);
        v
    }
}

fn select(target: RatingTarget) -> String {
    format!(
        "SELECT id, user_id, {} AS subject_id, rating, comment, reply_id, created_at FROM {}",
        target.subject_column(),
        target.table()
    )
}

pub async fn insert(
    db: &PgPool,
    target: RatingTarget,
    user_id: i64,
    input: &RatingInput,
) -> anyhow::Result<i64> {
    let sql = format!(
        "INSERT INTO {} (user_id, {}, rating, comment) VALUES ($1, $2, $3, $4) RETURNING id",
        target.table(),
        target.subject_column()
    );
    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(input.subject_id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(db)
        .await
        .with_context(|| format!("insert {}", target.table()))?;
    Ok(id)
}

pub async fn get(db: &PgPool, target: RatingTarget, id: i64) -> anyhow::Result<Option<Rating>> {
    let sql = format!("{} WHERE id = $1", select(target));
    let row = sqlx::query_as::<_, Rating>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .with_context(|| format!("fetch {}", target.table()))?;
    Ok(row)
}

/// Stores a reply under `parent`; replies carry no score.
pub async fn insert_reply(
    db: &PgPool,
    target: RatingTarget,
    user_id: i64,
    parent: &Rating,
    comment: &str,
) -> anyhow::Result<i64> {
    let sql = format!(
        "INSERT INTO {} (user_id, {}, rating, comment, reply_id) \
         VALUES ($1, $2, NULL, $3, $4) RETURNING id",
        target.table(),
        target.subject_column()
    );
    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(parent.subject_id)
        .bind(comment)
        .bind(parent.id)
        .fetch_one(db)
        .await
        .with_context(|| format!("insert reply into {}", target.table()))?;
    Ok(id)
}

pub async fn update(
    db: &PgPool,
    target: RatingTarget,
    id: i64,
    user_id: i64,
    input: &RatingUpdate,
) -> anyhow::Result<bool> {
    let sql = format!(
        r#"
        UPDATE {} SET
            rating = CASE WHEN reply_id IS NULL THEN COALESCE($3, rating) ELSE NULL END,
            comment = $4
        WHERE id = $1 AND user_id = $2
        "#,
        target.table()
    );
    let res = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .bind(input.rating)
        .bind(&input.comment)
        .execute(db)
        .await
        .with_context(|| format!("update {}", target.table()))?;
    Ok(res.rows_affected() > 0)
}

/// Deletes a rating owned by `user_id` together with its replies.
pub async fn delete(
    tx: &mut Transaction<'_, Postgres>,
    target: RatingTarget,
    id: i64,
    user_id: i64,
) -> anyhow::Result<bool> {
    let table = target.table();
    let owned: Option<(i64,)> = sqlx::query_as(&format!(
        "SELECT id FROM {table} WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .with_context(|| format!("lock {table} row"))?;
    if owned.is_none() {
        return Ok(false);
    }

    sqlx::query(&format!("DELETE FROM {table} WHERE reply_id = $1"))
        .bind(id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("delete {table} replies"))?;
    sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("delete {table} row"))?;
    Ok(true)
}

pub async fn list_for_subject(
    db: &PgPool,
    target: RatingTarget,
    subject_id: i64,
) -> anyhow::Result<Vec<Rating>> {
    let sql = format!(
        "{} WHERE {} = $1 ORDER BY created_at, id",
        select(target),
        target.subject_column()
    );
    let rows = sqlx::query_as::<_, Rating>(&sql)
        .bind(subject_id)
        .fetch_all(db)
        .await
        .with_context(|| format!("list {}", target.table()))?;
    Ok(rows)
}

/// Mean score of the subject; replies have no score and `0.0` means unrated.
pub async fn average(db: &PgPool, target: RatingTarget, subject_id: i64) -> anyhow::Result<f64> {
    let sql = format!(
        "SELECT COALESCE(AVG(rating), 0)::float8 FROM {} WHERE {} = $1",
        target.table(),
        target.subject_column()
    );
    let (avg,): (f64,) = sqlx::query_as(&sql)
        .bind(subject_id)
        .fetch_one(db)
        .await
        .with_context(|| format!("average {}", target.table()))?;
    Ok(avg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_subject_column_name() {
        let r = Rating {
            id: 1,
            user_id: 2,
            subject_id: 3,
            rating: None,
            comment: "thanks!".into(),
            reply_id: Some(9),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let v = r.to_json(RatingTarget::Product);
        assert_eq!(v["product_id"], 3);
        assert!(v["rating"].is_null());
        assert_eq!(v["created_at"], "1970-01-01T00:00:00Z");
        assert!(v.get("recipe_id").is_none());
    }
}
