use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::outbox::{self, OutboxEvent, OutboxOp};
use super::IndexName;
use crate::{catalog, products, recipes, state::AppState};

/// Builds the current document for `id`, or `None` when the row no longer exists.
async fn document(state: &AppState, index: IndexName, id: i64) -> anyhow::Result<Option<Value>> {
    match index {
        IndexName::Recipes => Ok(recipes::repo::get_details(&state.db, id)
            .await?
            .map(|details| recipes::services::recipe_document(&details))),
        IndexName::Products => products::repo::get(&state.db, id)
            .await?
            .map(serde_json::to_value)
            .transpose()
            .context("serialize product document"),
        IndexName::Ingredients | IndexName::Tools | IndexName::Pantries => {
            let kind = catalog::CatalogKind::from_index(index)
                .with_context(|| format!("{} is not a catalog index", index.as_str()))?;
            catalog::repo::get(&state.db, kind, id)
                .await?
                .map(serde_json::to_value)
                .transpose()
                .context("serialize catalog document")
        }
    }
}

async fn apply(state: &AppState, event: &OutboxEvent) -> anyhow::Result<()> {
    match event.op {
        OutboxOp::Delete => state.search.delete(event.index, event.doc_id).await,
        OutboxOp::Upsert => match document(state, event.index, event.doc_id).await? {
            Some(doc) => state.search.upsert(event.index, event.doc_id, &doc).await,
            None => {
                debug!(index = event.index.as_str(), id = event.doc_id, "row gone, deleting document");
                state.search.delete(event.index, event.doc_id).await
            }
        },
    }
}

/// Claims, applies and settles one batch. Returns `(claimed, applied)`.
///
/// No transaction is held while documents are rebuilt or the index is called;
/// each step borrows a pool connection only for its own statement.
async fn process(
    state: &AppState,
    only: Option<&[i64]>,
    limit: i64,
) -> anyhow::Result<(usize, usize)> {
    let max_attempts = state.config.outbox.max_attempts;
    let events = outbox::claim(&state.db, only, limit, max_attempts).await?;

    let mut applied = 0;
    for event in &events {
        match apply(state, event).await {
            Ok(()) => {
                outbox::complete(&state.db, event.id).await?;
                applied += 1;
            }
            Err(e) => {
                let message = format!("{e:#}");
                let attempts = outbox::fail(&state.db, event, &message).await?;
                if attempts >= max_attempts {
                    error!(
                        event_id = event.id,
                        index = event.index.as_str(),
                        doc_id = event.doc_id,
                        attempts,
                        error = %message,
                        "search event abandoned"
                    );
                } else {
                    warn!(
                        event_id = event.id,
                        index = event.index.as_str(),
                        doc_id = event.doc_id,
                        attempts,
                        error = %message,
                        "search event failed, will retry"
                    );
                }
            }
        }
    }

    Ok((events.len(), applied))
}

/// Applies freshly committed events right away.
///
/// Returns `true` only if every event reached the index. Anything left over is
/// picked up by [`run_relay`].
#[instrument(skip(state))]
pub async fn dispatch(state: &AppState, event_ids: &[i64]) -> bool {
    if event_ids.is_empty() {
        return true;
    }
    match process(state, Some(event_ids), event_ids.len() as i64).await {
        Ok((_, applied)) => applied == event_ids.len(),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "inline search dispatch failed");
            false
        }
    }
}

/// Processes one batch of due events; returns how many were claimed.
pub async fn drain_once(state: &AppState) -> anyhow::Result<usize> {
    let (claimed, applied) = process(state, None, state.config.outbox.batch_size).await?;
    if claimed > 0 {
        debug!(claimed, applied, "outbox batch processed");
    }
    Ok(claimed)
}

/// Background loop retrying pending events until `shutdown` flips to `true`.
pub async fn run_relay(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_millis(state.config.outbox.poll_interval_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(poll_ms = period.as_millis() as u64, "search relay started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // keep going while full batches come back
                loop {
                    match drain_once(&state).await {
                        Ok(n) if n as i64 >= state.config.outbox.batch_size => continue,
                        Ok(_) => break,
                        Err(e) => {
                            warn!(error = %format!("{e:#}"), "outbox drain failed");
                            break;
                        }
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("search relay stopped");
}
