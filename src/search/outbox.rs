use std::time::Duration;

use anyhow::Context;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::IndexName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxOp {
    Upsert,
    Delete,
}

impl OutboxOp {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxOp::Upsert => "upsert",
            OutboxOp::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upsert" => Some(OutboxOp::Upsert),
            "delete" => Some(OutboxOp::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: i64,
    index_name: String,
    doc_id: i64,
    op: String,
    attempts: i32,
}

/// A pending index mutation, claimed for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    pub id: i64,
    pub index: IndexName,
    pub doc_id: i64,
    pub op: OutboxOp,
    pub attempts: i32,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = anyhow::Error;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let index = IndexName::parse(&row.index_name)
            .with_context(|| format!("unknown index {:?} in outbox row {}", row.index_name, row.id))?;
        let op = OutboxOp::parse(&row.op)
            .with_context(|| format!("unknown op {:?} in outbox row {}", row.op, row.id))?;
        Ok(OutboxEvent {
            id: row.id,
            index,
            doc_id: row.doc_id,
            op,
            attempts: row.attempts,
        })
    }
}

/// Records an index mutation as part of the caller's transaction.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    index: IndexName,
    doc_id: i64,
    op: OutboxOp,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO search_outbox (index_name, doc_id, op)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(index.as_str())
    .bind(doc_id)
    .bind(op.as_str())
    .fetch_one(&mut **tx)
    .await
    .context("enqueue search event")?;
    Ok(id)
}

/// Queues a re-index of every recipe linked through `link_table.link_column = id`.
///
/// `link_table` and `link_column` are compile-time identifiers, never user input.
pub async fn enqueue_linked_recipes(
    tx: &mut Transaction<'_, Postgres>,
    link_table: &'static str,
    link_column: &'static str,
    id: i64,
) -> anyhow::Result<Vec<i64>> {
    let sql = format!(
        r#"
        INSERT INTO search_outbox (index_name, doc_id, op)
        SELECT DISTINCT $1, recipe_id, $2 FROM {link_table} WHERE {link_column} = $3
        RETURNING id
        "#
    );
    let ids: Vec<(i64,)> = sqlx::query_as(&sql)
        .bind(IndexName::Recipes.as_str())
        .bind(OutboxOp::Upsert.as_str())
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .context("enqueue linked recipe re-index")?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// How long a claimed event stays invisible to other claimers. A worker that dies
/// mid-flight leaves the event to be retried once the lease runs out.
pub const CLAIM_LEASE: Duration = Duration::from_secs(60);

/// Leases due events by pushing their `available_at` past [`CLAIM_LEASE`].
///
/// Rows another claimer holds are skipped, not waited on. The lease is committed
/// before returning, so no connection stays pinned while events are applied.
/// With `only` set, claims are restricted to those event ids.
pub async fn claim(
    db: &PgPool,
    only: Option<&[i64]>,
    limit: i64,
    max_attempts: i32,
) -> anyhow::Result<Vec<OutboxEvent>> {
    let mut rows = sqlx::query_as::<_, OutboxRow>(
        r#"
        UPDATE search_outbox o
        SET available_at = now() + make_interval(secs => $4)
        FROM (
            SELECT id
            FROM search_outbox
            WHERE available_at <= now()
              AND attempts < $1
              AND ($2::BIGINT[] IS NULL OR id = ANY($2))
            ORDER BY id
            LIMIT $3
            FOR UPDATE SKIP LOCKED
        ) due
        WHERE o.id = due.id
        RETURNING o.id, o.index_name, o.doc_id, o.op, o.attempts
        "#,
    )
    .bind(max_attempts)
    .bind(only.map(<[i64]>::to_vec))
    .bind(limit)
    .bind(CLAIM_LEASE.as_secs_f64())
    .fetch_all(db)
    .await
    .context("claim search events")?;

    rows.sort_by_key(|row| row.id);
    rows.into_iter().map(OutboxEvent::try_from).collect()
}

pub async fn complete(db: &PgPool, event_id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM search_outbox WHERE id = $1")
        .bind(event_id)
        .execute(db)
        .await
        .context("delete search event")?;
    Ok(())
}

/// Bumps the attempt counter and defers the event by [`backoff`].
pub async fn fail(db: &PgPool, event: &OutboxEvent, error: &str) -> anyhow::Result<i32> {
    let attempts = event.attempts + 1;
    sqlx::query(
        r#"
        UPDATE search_outbox
        SET attempts = $2,
            last_error = $3,
            available_at = now() + make_interval(secs => $4)
        WHERE id = $1
        "#,
    )
    .bind(event.id)
    .bind(attempts)
    .bind(error)
    .bind(backoff(attempts).as_secs_f64())
    .execute(db)
    .await
    .context("record search event failure")?;
    Ok(attempts)
}

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Delay before the next try after `attempts` failures: 1s, 2s, 4s, ... capped at 5 min.
pub fn backoff(attempts: i32) -> Duration {
    let exp = attempts.saturating_sub(1).clamp(0, 16) as u32;
    BACKOFF_BASE.saturating_mul(1 << exp).min(BACKOFF_CAP)
}
