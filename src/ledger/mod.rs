//! Log store, aggregate store and the recompute engine that keeps them in step.
//!
//! Every mutating write goes through [`engine`], which opens a [`LedgerTx`],
//! applies the log change and re-derives every affected [`AggregateRow`] before
//! committing. Aggregate rows are never touched anywhere else.

pub mod engine;
pub mod entries;
pub mod keys;
pub mod memory;
pub mod repo;
mod repo_types;
pub mod totals;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

pub use entries::{EntryKind, ExerciseEntry, FoodEntry, LogEntry, LogSource};
pub use keys::{parse_date, AggregateKey, MealType};
pub use totals::{ActivityTotals, AggregateRow, NutrientTotals, Totals};

/// One storage transaction. Dropping it without [`LedgerTx::commit`] rolls back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Serialize writers on the given keys until commit.
    async fn lock_keys(&mut self, keys: &[AggregateKey]) -> anyhow::Result<()>;

    /// Fetch an entry owned by `user_id`, locking it for the rest of the transaction.
    async fn find_entry(
        &mut self,
        kind: EntryKind,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<LogEntry>>;

    async fn insert_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()>;
    async fn update_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()>;
    async fn delete_entry(&mut self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<()>;

    /// Every entry counting towards `key`, ordered by id.
    async fn entries_for(&mut self, key: &AggregateKey) -> anyhow::Result<Vec<LogEntry>>;

    async fn aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>>;
    async fn put_aggregate(&mut self, row: &AggregateRow) -> anyhow::Result<()>;
    async fn remove_aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<()>;

    async fn commit(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn LedgerTx>>;

    async fn aggregate(&self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>>;

    async fn entry(&self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<LogEntry>>;

    /// Food and exercise entries of one user on one day.
    async fn entries_on(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<LogEntry>>;

    /// Keys that have entries or aggregate rows, optionally for one user.
    async fn known_keys(&self, user_id: Option<Uuid>) -> anyhow::Result<Vec<AggregateKey>>;
}
