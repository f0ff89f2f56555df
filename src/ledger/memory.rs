use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use anyhow::{bail, Context};
use async_trait::async_trait;
use time::Date;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AggregateKey, AggregateRow, EntryKind, Ledger, LedgerTx, LogEntry, LogSource};

/// In-process ledger for tests and `STORAGE_BACKEND=memory`.
///
/// Not durable. A transaction holds the single lock for its whole lifetime and
/// works on a copy of the tables, so writers are fully serialized and an
/// abandoned transaction leaves nothing behind.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    entries: BTreeMap<Uuid, LogEntry>,
    aggregates: BTreeMap<AggregateKey, AggregateRow>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state.
    #[cfg(test)]
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }
}

impl Tables {
    fn owned(&self, kind: EntryKind, user_id: Uuid, id: Uuid) -> Option<&LogEntry> {
        self.entries
            .get(&id)
            .filter(|e| e.kind() == kind && e.owner() == user_id)
    }

    fn matching(&self, key: &AggregateKey) -> Vec<LogEntry> {
        self.entries
            .values()
            .filter(|e| e.aggregate_keys().contains(key))
            .cloned()
            .collect()
    }
}

struct MemoryTx {
    committed: OwnedMutexGuard<Tables>,
    staged: Option<Tables>,
}

impl MemoryTx {
    fn staged(&mut self) -> anyhow::Result<&mut Tables> {
        self.staged.as_mut().context("transaction already committed")
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_keys(&mut self, _keys: &[AggregateKey]) -> anyhow::Result<()> {
        // the table lock is already held
        Ok(())
    }

    async fn find_entry(
        &mut self,
        kind: EntryKind,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<LogEntry>> {
        Ok(self.staged()?.owned(kind, user_id, id).cloned())
    }

    async fn insert_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()> {
        let tables = self.staged()?;
        let id = entry.entry_id();
        if tables.entries.contains_key(&id) {
            bail!("entry {id} already exists");
        }
        tables.entries.insert(id, entry.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()> {
        let tables = self.staged()?;
        let id = entry.entry_id();
        if tables.owned(entry.kind(), entry.owner(), id).is_none() {
            bail!("entry {id} does not exist");
        }
        tables.entries.insert(id, entry.clone());
        Ok(())
    }

    async fn delete_entry(&mut self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<()> {
        let tables = self.staged()?;
        if tables.owned(kind, user_id, id).is_some() {
            tables.entries.remove(&id);
        }
        Ok(())
    }

    async fn entries_for(&mut self, key: &AggregateKey) -> anyhow::Result<Vec<LogEntry>> {
        Ok(self.staged()?.matching(key))
    }

    async fn aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>> {
        Ok(self.staged()?.aggregates.get(key).cloned())
    }

    async fn put_aggregate(&mut self, row: &AggregateRow) -> anyhow::Result<()> {
        self.staged()?.aggregates.insert(row.key, row.clone());
        Ok(())
    }

    async fn remove_aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<()> {
        self.staged()?.aggregates.remove(key);
        Ok(())
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        let staged = self.staged.take().context("transaction already committed")?;
        *self.committed = staged;
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self) -> anyhow::Result<Box<dyn LedgerTx>> {
        let committed = Arc::clone(&self.tables).lock_owned().await;
        let staged = Some(committed.clone());
        Ok(Box::new(MemoryTx { committed, staged }))
    }

    async fn aggregate(&self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>> {
        Ok(self.tables.lock().await.aggregates.get(key).cloned())
    }

    async fn entry(&self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<LogEntry>> {
        Ok(self.tables.lock().await.owned(kind, user_id, id).cloned())
    }

    /// Food entries first, each kind ordered by creation time then id.
    async fn entries_on(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<LogEntry>> {
        let tables = self.tables.lock().await;
        let day_keys = [
            AggregateKey::FoodDay { user_id, date },
            AggregateKey::ExerciseDay { user_id, date },
        ];
        let mut entries: Vec<LogEntry> = tables
            .entries
            .values()
            .filter(|e| e.aggregate_keys().iter().any(|k| day_keys.contains(k)))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.kind() == EntryKind::Exercise, e.created_at(), e.entry_id()));
        Ok(entries)
    }

    async fn known_keys(&self, user_id: Option<Uuid>) -> anyhow::Result<Vec<AggregateKey>> {
        let tables = self.tables.lock().await;
        let keys: BTreeSet<AggregateKey> = tables
            .entries
            .values()
            .flat_map(|e| e.aggregate_keys())
            .chain(tables.aggregates.keys().copied())
            .filter(|k| user_id.map_or(true, |u| k.user_id() == u))
            .collect();
        Ok(keys.into_iter().collect())
    }
}
