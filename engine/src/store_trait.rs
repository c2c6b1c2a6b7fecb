//! The `Store` contract (§6): traits a concrete ordered key-value store
//! must implement for the engine to run scans, triggers, and backfill
//! against it. Grounded on the teacher's `StorageEngine`/`StorageBucket`
//! split (`core/src/storage/mod.rs`), generalized from "collection of
//! records" to "ordered index of byte keys/values".

use async_trait::async_trait;
use std::time::Duration;

pub type Bytes = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Upgradable,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Full,
    None,
}

/// Outcome of an upgradable-lock attempt with a timeout (§4.8 uses
/// `timeout = 0` to probe without blocking).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    TimedOut,
    Illegal,
}

/// A transaction bound to one store. Every blocking call on `Index`/`Cursor`
/// takes a `&Txn` and honors its `lock_timeout`.
#[async_trait]
pub trait Txn: Send + Sync + std::any::Any {
    /// Lets a concrete store downcast a `&dyn Txn` back to its own type,
    /// needed by `unlock_combine` implementations that reassign lock
    /// ownership between two transactions.
    fn as_any(&self) -> &dyn std::any::Any;

    fn lock_timeout(&self) -> Option<Duration>;
    fn set_lock_timeout(&self, timeout: Option<Duration>);
    fn lock_mode(&self) -> LockMode;
    fn durability_mode(&self) -> Durability;

    /// Pushes a nested scope; backfill's phase-2 redo integration uses this
    /// to apply a rollback-able write inside a larger replication
    /// transaction.
    async fn enter(&self) -> anyhow::Result<()>;
    async fn exit(&self) -> anyhow::Result<()>;
    async fn commit(&self) -> anyhow::Result<()>;

    fn unlock(&self, key: &[u8]);
    /// Merges this transaction's lock set into `other`'s, used when a
    /// cursor's lifetime outlives the transaction that created it.
    fn unlock_combine(&self, other: &dyn Txn, key: &[u8]);
}

/// A cursor over one index's byte-ordered key space. Owned by exactly one
/// scanner at a time (§5: "must not be shared between scanners").
#[async_trait]
pub trait Cursor: Send {
    async fn first(&mut self) -> anyhow::Result<bool>;
    async fn next(&mut self) -> anyhow::Result<bool>;
    /// Positions exactly at `key`, or just after it if absent (used to seed
    /// a scan's lower bound and the auto-key generator's candidate probe).
    async fn find(&mut self, key: &[u8]) -> anyhow::Result<bool>;
    /// Repositions relative to the current location, cheaper than `find`
    /// when the target is nearby (adjacent secondary-index reconciliation).
    async fn find_nearby(&mut self, key: &[u8]) -> anyhow::Result<bool>;

    /// Positions on the last (highest-keyed) row, the reverse-scan
    /// counterpart to `first`.
    async fn last(&mut self) -> anyhow::Result<bool>;
    /// Steps to the previous (lower-keyed) row, the reverse-scan
    /// counterpart to `next`.
    async fn prev(&mut self) -> anyhow::Result<bool>;
    /// Positions exactly at `key`, or just before it if absent, the
    /// reverse-scan counterpart to `find`.
    async fn find_before(&mut self, key: &[u8]) -> anyhow::Result<bool>;

    fn key(&self) -> Option<&[u8]>;
    fn value(&self) -> Option<&[u8]>;

    fn reset(&mut self);
    /// Loads the value lazily; callers that only need the key (e.g. a
    /// covering plain-secondary scan) skip this.
    async fn autoload(&mut self) -> anyhow::Result<()>;

    /// Registers this cursor with its owning transaction so lock release
    /// on commit/rollback also releases the cursor's position lock.
    fn register(&mut self, txn: &dyn Txn);
    fn link(&mut self, txn: &dyn Txn);
}

/// One ordered index: the primary table or a secondary. Matches §6's
/// "Index operations".
#[async_trait]
pub trait Index: Send + Sync {
    type Cursor: Cursor;

    async fn new_cursor(&self, txn: &dyn Txn) -> anyhow::Result<Self::Cursor>;
    async fn load(&self, txn: &dyn Txn, key: &[u8]) -> anyhow::Result<Option<Bytes>>;
    async fn store(&self, txn: &dyn Txn, key: &[u8], value: Option<&[u8]>) -> anyhow::Result<()>;
    /// `store` with a uniqueness check; returns `false` (not an error) on
    /// conflict so alt-key triggers can translate it to `UniqueConstraint`.
    async fn insert(&self, txn: &dyn Txn, key: &[u8], value: &[u8]) -> anyhow::Result<bool>;
    async fn delete(&self, txn: &dyn Txn, key: &[u8]) -> anyhow::Result<()>;
    async fn lock_upgradable(&self, txn: &dyn Txn, key: &[u8], timeout: Duration) -> anyhow::Result<LockOutcome>;
}

/// External key-value sorter used by backfill's bulk-sort phase (§4.7
/// phase 1). A real implementation spills to disk once a memory budget is
/// exceeded; the engine only depends on this interface.
#[async_trait]
pub trait Sorter: Send + Sync {
    async fn add_batch(&self, entries: &[(Bytes, Bytes)]) -> anyhow::Result<()>;
    /// Consumes the sorter, yielding the name of a temporary ordered index
    /// containing the fully sorted output. Returns `None` if the sorter
    /// was closed mid-run (cooperative cancellation).
    async fn finish(self: Box<Self>) -> anyhow::Result<Option<String>>;
    fn reset(&self);
}

/// Callback invoked on replicated writes while a backfill is watching a
/// secondary (§4.7's redo-log listener integration).
#[async_trait]
pub trait RedoListener: Send + Sync {
    async fn store(&self, txn: &dyn Txn, index: &str, key: &[u8], value: Option<&[u8]>) -> anyhow::Result<()>;
}
