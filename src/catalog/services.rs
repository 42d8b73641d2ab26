use tracing::{info, warn};

use super::dto::CatalogItemInput;
use super::{repo, CatalogKind};
use crate::error::{ApiError, ApiResult};
use crate::search::{outbox, sync, OutboxOp};
use crate::state::AppState;

async fn create_one(state: &AppState, kind: CatalogKind, item: &CatalogItemInput) -> ApiResult<(i64, i64)> {
    let mut tx = state.db.begin().await?;
    let id = repo::insert(&mut tx, kind, item).await?;
    let event_id = outbox::enqueue(&mut tx, kind.index(), id, OutboxOp::Upsert).await?;
    tx.commit().await?;
    Ok((id, event_id))
}

/// Returns the new id and whether it is already searchable.
pub async fn create(state: &AppState, kind: CatalogKind, item: &CatalogItemInput) -> ApiResult<(i64, bool)> {
    let (id, event_id) = create_one(state, kind, item).await?;
    info!(table = kind.table(), id, "catalog item created");
    Ok((id, sync::dispatch(state, &[event_id]).await))
}

/// Outcome of a bulk insert. Items before `failure` stay committed.
#[derive(Debug)]
pub struct BulkOutcome {
    pub created_ids: Vec<i64>,
    pub indexed: bool,
    pub failure: Option<(usize, ApiError)>,
}

/// Inserts items one transaction at a time and stops at the first failure.
pub async fn create_many(
    state: &AppState,
    kind: CatalogKind,
    items: &[CatalogItemInput],
) -> BulkOutcome {
    let mut created_ids = Vec::with_capacity(items.len());
    let mut event_ids = Vec::with_capacity(items.len());
    let mut failure = None;

    for (i, item) in items.iter().enumerate() {
        match create_one(state, kind, item).await {
            Ok((id, event_id)) => {
                created_ids.push(id);
                event_ids.push(event_id);
            }
            Err(e) => {
                warn!(table = kind.table(), index = i, error = %e, "bulk create stopped");
                failure = Some((i, e));
                break;
            }
        }
    }

    let indexed = sync::dispatch(state, &event_ids).await;
    info!(table = kind.table(), created = created_ids.len(), "bulk create finished");
    BulkOutcome {
        created_ids,
        indexed,
        failure,
    }
}

/// Full replace. A rename also re-indexes every recipe embedding the old name.
pub async fn update(
    state: &AppState,
    kind: CatalogKind,
    id: i64,
    item: &CatalogItemInput,
) -> ApiResult<bool> {
    let mut tx = state.db.begin().await?;

    let old_name = repo::lock_name(&mut tx, kind, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.noun())))?;
    repo::update(&mut tx, kind, id, item).await?;

    let mut event_ids = vec![outbox::enqueue(&mut tx, kind.index(), id, OutboxOp::Upsert).await?];
    if old_name != item.name {
        if let Some((table, column)) = kind.recipe_link() {
            let linked = outbox::enqueue_linked_recipes(&mut tx, table, column, id).await?;
            info!(table = kind.table(), id, recipes = linked.len(), "rename re-indexes recipes");
            event_ids.extend(linked);
        }
    }

    tx.commit().await?;
    Ok(sync::dispatch(state, &event_ids).await)
}

/// Deletes the item. Rows still referenced by recipes or products fail with a conflict.
pub async fn delete(state: &AppState, kind: CatalogKind, id: i64) -> ApiResult<bool> {
    let mut tx = state.db.begin().await?;
    if !repo::delete(&mut tx, kind, id).await? {
        return Err(ApiError::not_found(format!("{} not found", kind.noun())));
    }
    let event_id = outbox::enqueue(&mut tx, kind.index(), id, OutboxOp::Delete).await?;
    tx.commit().await?;
    Ok(sync::dispatch(state, &[event_id]).await)
}
