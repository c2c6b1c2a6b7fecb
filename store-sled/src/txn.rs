//! `SledTxn`: the concrete `Txn` this crate hands the engine. Locks are
//! tracked per transaction and released on commit; `enter`/`exit` track
//! the nested-scope depth backfill's redo-hook writes use (§4.7).

use crate::locks::{LockTable, TxnId};
use async_trait::async_trait;
use relstore_engine::{Durability, LockMode, Txn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

pub struct SledTxn {
    id: TxnId,
    lock_timeout: Mutex<Option<Duration>>,
    lock_mode: LockMode,
    durability: Durability,
    lock_table: Arc<LockTable>,
    held: Mutex<HashSet<Vec<u8>>>,
    depth: AtomicU32,
}

impl SledTxn {
    pub fn new(lock_mode: LockMode, durability: Durability, lock_table: Arc<LockTable>) -> Self {
        let id = TxnId(NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed));
        SledTxn { id, lock_timeout: Mutex::new(None), lock_mode, durability, lock_table, held: Mutex::new(HashSet::new()), depth: AtomicU32::new(0) }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.lock_table
    }

    /// Records a lock acquired through `self`'s table so `commit` can
    /// release the full set.
    pub(crate) fn remember_lock(&self, key: &[u8]) {
        self.held.lock().unwrap().insert(key.to_vec());
    }
}

#[async_trait]
impl Txn for SledTxn {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn lock_timeout(&self) -> Option<Duration> {
        *self.lock_timeout.lock().unwrap()
    }

    fn set_lock_timeout(&self, timeout: Option<Duration>) {
        *self.lock_timeout.lock().unwrap() = timeout;
    }

    fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    fn durability_mode(&self) -> Durability {
        self.durability
    }

    async fn enter(&self) -> anyhow::Result<()> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn exit(&self) -> anyhow::Result<()> {
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    async fn commit(&self) -> anyhow::Result<()> {
        let held = std::mem::take(&mut *self.held.lock().unwrap());
        for key in held {
            self.lock_table.unlock(&key, self.id);
        }
        Ok(())
    }

    fn unlock(&self, key: &[u8]) {
        self.lock_table.unlock(key, self.id);
        self.held.lock().unwrap().remove(key);
    }

    fn unlock_combine(&self, other: &dyn Txn, key: &[u8]) {
        if let Some(other) = other.as_any().downcast_ref::<SledTxn>() {
            self.lock_table.combine(key, self.id, other.id);
            self.held.lock().unwrap().insert(key.to_vec());
        }
    }
}
