use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{AggregateKey, AggregateRow, EntryKind, Ledger, LedgerTx, LogEntry, LogSource};
use crate::error::AppError;

/// What a recompute did to the row for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeOutcome {
    /// absent -> present
    Created,
    /// present -> present, sums changed
    Updated,
    /// present -> present, row already matched the log
    Unchanged,
    /// present -> absent
    Removed,
    /// absent -> absent
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyRecompute {
    #[serde(flatten)]
    pub key: AggregateKey,
    pub outcome: RecomputeOutcome,
}

/// Re-derive the row for `key` from the entries visible to `tx`.
pub async fn recompute_in(tx: &mut dyn LedgerTx, key: AggregateKey) -> anyhow::Result<RecomputeOutcome> {
    let entries = tx.entries_for(&key).await?;
    let current = tx.aggregate(&key).await?;
    let derived = AggregateRow::derive(key, &entries, OffsetDateTime::now_utc())?;
    let calories = derived.as_ref().map_or(0.0, AggregateRow::calories);

    let outcome = match (derived, current) {
        (None, None) => RecomputeOutcome::Absent,
        (None, Some(_)) => {
            tx.remove_aggregate(&key).await?;
            RecomputeOutcome::Removed
        }
        (Some(row), None) => {
            tx.put_aggregate(&row).await?;
            RecomputeOutcome::Created
        }
        (Some(row), Some(current)) if row.same_contents(&current) => RecomputeOutcome::Unchanged,
        (Some(row), Some(_)) => {
            tx.put_aggregate(&row).await?;
            RecomputeOutcome::Updated
        }
    };

    debug!(%key, ?outcome, entries = entries.len(), calories, "aggregate recomputed");
    Ok(outcome)
}

async fn recompute_keys_in(
    tx: &mut dyn LedgerTx,
    keys: &[AggregateKey],
) -> anyhow::Result<Vec<KeyRecompute>> {
    let mut out = Vec::with_capacity(keys.len());
    for &key in keys {
        let outcome = recompute_in(tx, key).await?;
        out.push(KeyRecompute { key, outcome });
    }
    Ok(out)
}

/// Sorted and deduplicated, which is also the lock order.
fn affected_keys(keys: impl IntoIterator<Item = AggregateKey>) -> Vec<AggregateKey> {
    keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

pub async fn insert_entry(ledger: &dyn Ledger, entry: LogEntry) -> Result<Vec<KeyRecompute>, AppError> {
    insert_entries(ledger, &[entry]).await
}

/// Insert all entries in one transaction; each affected key is recomputed once.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn insert_entries(
    ledger: &dyn Ledger,
    entries: &[LogEntry],
) -> Result<Vec<KeyRecompute>, AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation("nothing to insert".into()));
    }
    for entry in entries {
        entry.validate()?;
    }
    let keys = affected_keys(entries.iter().flat_map(|e| e.aggregate_keys()));

    let mut tx = ledger.begin().await?;
    tx.lock_keys(&keys).await?;
    for entry in entries {
        tx.insert_entry(entry).await?;
    }
    let recomputed = recompute_keys_in(tx.as_mut(), &keys).await?;
    tx.commit().await?;

    info!(keys = keys.len(), "entries inserted");
    Ok(recomputed)
}

/// Read an entry under its row lock, let `apply` build the replacement from
/// it, then write and recompute in the same transaction. Concurrent edits of
/// one entry each see the other's committed fields.
#[instrument(skip(ledger, apply))]
pub async fn edit_entry<T, F>(
    ledger: &dyn Ledger,
    kind: EntryKind,
    user_id: Uuid,
    id: Uuid,
    apply: F,
) -> Result<(LogEntry, T, Vec<KeyRecompute>), AppError>
where
    F: FnOnce(LogEntry) -> Result<(LogEntry, T), AppError> + Send,
    T: Send,
{
    let mut tx = ledger.begin().await?;
    let previous = tx
        .find_entry(kind, user_id, id)
        .await?
        .ok_or(AppError::EntryNotFound(id))?;

    let (entry, extra) = apply(previous.clone())?;
    if entry.kind() != kind || entry.owner() != user_id || entry.entry_id() != id {
        return Err(AppError::Validation("an edit cannot change which entry it is".into()));
    }
    entry.validate()?;

    let keys = affected_keys(previous.aggregate_keys().into_iter().chain(entry.aggregate_keys()));
    tx.lock_keys(&keys).await?;
    tx.update_entry(&entry).await?;
    let recomputed = recompute_keys_in(tx.as_mut(), &keys).await?;
    tx.commit().await?;

    info!(keys = keys.len(), "entry updated");
    Ok((entry, extra, recomputed))
}

#[instrument(skip(ledger))]
pub async fn delete_entry(
    ledger: &dyn Ledger,
    kind: EntryKind,
    user_id: Uuid,
    id: Uuid,
) -> Result<(LogEntry, Vec<KeyRecompute>), AppError> {
    let mut tx = ledger.begin().await?;
    let previous = tx
        .find_entry(kind, user_id, id)
        .await?
        .ok_or(AppError::EntryNotFound(id))?;

    let keys = affected_keys(previous.aggregate_keys());
    tx.lock_keys(&keys).await?;
    tx.delete_entry(kind, user_id, id).await?;
    let recomputed = recompute_keys_in(tx.as_mut(), &keys).await?;
    tx.commit().await?;

    info!(keys = keys.len(), "entry deleted");
    Ok((previous, recomputed))
}

/// Repair entrypoint. Safe for any key, including keys with no entries.
#[instrument(skip(ledger, key), fields(%key))]
pub async fn recompute(ledger: &dyn Ledger, key: AggregateKey) -> Result<KeyRecompute, AppError> {
    let mut tx = ledger.begin().await?;
    tx.lock_keys(&[key]).await?;
    let outcome = recompute_in(tx.as_mut(), key).await?;
    tx.commit().await?;

    info!(?outcome, "key recomputed");
    Ok(KeyRecompute { key, outcome })
}

/// Recompute every key that has entries or rows. Each key commits on its own.
pub async fn reconcile_all(
    ledger: &dyn Ledger,
    user_id: Option<Uuid>,
) -> Result<Vec<KeyRecompute>, AppError> {
    let keys = ledger.known_keys(user_id).await?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        out.push(recompute(ledger, key).await?);
    }

    let changed = out
        .iter()
        .filter(|r| !matches!(r.outcome, RecomputeOutcome::Unchanged | RecomputeOutcome::Absent))
        .count();
    info!(keys = out.len(), changed, "reconcile finished");
    Ok(out)
}
