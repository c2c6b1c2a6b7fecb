//! Online backfill (C7): brings a newly-declared secondary index to full
//! consistency while writes continue, in four phases -- bulk sort,
//! finalize, reconcile, swap -- grounded on §4.7's hand-off protocol.

use crate::error::{EngineError, Result};
use crate::row::RowInfo;
use crate::store_trait::{Cursor, Index, Sorter, Txn};
use crate::transform::TransformMaker;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

const BULK_SORT_BATCH: usize = 100;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BulkSort = 0,
    Finalizing = 1,
    Reconciling = 2,
    Swapped = 3,
    Stopped = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Phase {
        match v {
            0 => Phase::BulkSort,
            1 => Phase::Finalizing,
            2 => Phase::Reconciling,
            3 => Phase::Swapped,
            _ => Phase::Stopped,
        }
    }
}

/// Drives one secondary index from `registered` to `active`. `I` is the
/// secondary's index type; the primary is supplied per-call to
/// [`Backfill::run`] since it may be a different concrete index type.
pub struct Backfill<I: Index> {
    sorter: Mutex<Option<Box<dyn Sorter>>>,
    deleted_tracker: Arc<I>,
    new_index: RwLock<Option<Arc<I>>>,
    secondary_index: RwLock<Arc<I>>,
    retired_index: RwLock<Option<Arc<I>>>,
    /// Opens the temporary ordered index a finished `Sorter` names, by
    /// delegating to the owning store (the engine crate has no concrete
    /// store to open one itself).
    open_index: Box<dyn Fn(&str) -> anyhow::Result<Arc<I>> + Send + Sync>,
    phase: AtomicU8,
    primary_row_info: RowInfo,
    secondary_row_info: RowInfo,
    alt_key: bool,
}

impl<I: Index> Backfill<I> {
    pub fn new(
        sorter: Box<dyn Sorter>,
        deleted_tracker: Arc<I>,
        secondary_index: Arc<I>,
        open_index: impl Fn(&str) -> anyhow::Result<Arc<I>> + Send + Sync + 'static,
        primary_row_info: RowInfo,
        secondary_row_info: RowInfo,
        alt_key: bool,
    ) -> Self {
        Backfill {
            sorter: Mutex::new(Some(sorter)),
            deleted_tracker,
            new_index: RwLock::new(None),
            secondary_index: RwLock::new(secondary_index),
            retired_index: RwLock::new(None),
            open_index: Box::new(open_index),
            phase: AtomicU8::new(Phase::BulkSort as u8),
            primary_row_info,
            secondary_row_info,
            alt_key,
        }
    }

    fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// The index currently live for reads: the original secondary before
    /// `swap()` completes, the freshly backfilled one after.
    pub fn secondary_index(&self) -> Arc<I> {
        self.secondary_index.read().unwrap().clone()
    }

    /// The index `swap()` retired, if any. The caller (the owning
    /// row-store) schedules its deletion once in-flight scans against it
    /// have drained.
    pub fn retired_index(&self) -> Option<Arc<I>> {
        self.retired_index.read().unwrap().clone()
    }

    fn transform(&self) -> TransformMaker<'_> {
        let mut maker = TransformMaker::new(&self.primary_row_info);
        if self.secondary_row_info.value_columns.is_empty() {
            maker.add_key_target(self.secondary_row_info.key_columns.clone(), self.alt_key);
        } else {
            maker.add_value_target(self.secondary_row_info.key_columns.clone(), self.secondary_row_info.value_columns.clone(), self.alt_key);
        }
        maker
    }

    /// Cooperative cancellation check: `close()` elsewhere nulls `sorter`,
    /// which phase 1 observes and stops on.
    pub fn stop(&self) {
        *self.sorter.lock().unwrap() = None;
        self.phase.store(Phase::Stopped as u8, Ordering::Release);
    }

    /// Runs phases 1-4 against a primary cursor the caller provides
    /// (read-committed, `lock_timeout = infinite`, `durability = none`,
    /// per §4.7). Returns `true` on a completed swap, `false` if the
    /// backfill was cooperatively stopped.
    pub async fn run<P: Index>(&self, primary_txn: &dyn Txn, primary: &P, txn: &dyn Txn) -> Result<bool> {
        if !self.bulk_sort(primary_txn, primary).await? {
            return Ok(false);
        }
        if !self.finalize().await? {
            return Ok(false);
        }
        self.reconcile(txn).await?;
        self.swap(txn).await?;
        Ok(true)
    }

    async fn bulk_sort<P: Index>(&self, primary_txn: &dyn Txn, primary: &P) -> Result<bool> {
        primary_txn.set_lock_timeout(None);
        let mut cursor = primary.new_cursor(primary_txn).await?;
        let mut batch: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(BULK_SORT_BATCH);
        let mut has_more = cursor.first().await?;

        while has_more {
            if self.sorter.lock().unwrap().is_none() {
                info!("backfill stopped during bulk sort");
                return Ok(false);
            }
            cursor.autoload().await?;
            let key = cursor.key().unwrap_or(&[]).to_vec();
            let value = cursor.value().unwrap_or(&[]).to_vec();
            let mut ctx = self.transform().begin(&key, &value);
            let (sk, sv) = ctx.encode(0)?;
            let entry = if self.secondary_row_info.value_columns.is_empty() { (sk, Vec::new()) } else { (sk, sv) };
            batch.push(entry);

            if batch.len() >= BULK_SORT_BATCH {
                let sorter_guard = self.sorter.lock().unwrap().take();
                let Some(sorter) = sorter_guard else { return Ok(false) };
                sorter.add_batch(&batch).await?;
                *self.sorter.lock().unwrap() = Some(sorter);
                batch.clear();
            }
            has_more = cursor.next().await?;
        }
        if !batch.is_empty() {
            let sorter_guard = self.sorter.lock().unwrap().take();
            let Some(sorter) = sorter_guard else { return Ok(false) };
            sorter.add_batch(&batch).await?;
            *self.sorter.lock().unwrap() = Some(sorter);
        }
        Ok(true)
    }

    /// Phase 2: finish the sorter, open the temporary index it names, and
    /// publish it as `new_index` so subsequent trigger writes start going
    /// to both indexes.
    async fn finalize(&self) -> Result<bool> {
        let sorter = self.sorter.lock().unwrap().take();
        let Some(sorter) = sorter else { return Ok(false) };
        self.phase.store(Phase::Finalizing as u8, Ordering::Release);
        let Some(temp_index_name) = sorter.finish().await? else {
            return Ok(false);
        };
        let new_index = (self.open_index)(&temp_index_name).map_err(EngineError::Store)?;
        *self.new_index.write().unwrap() = Some(new_index);
        self.phase.store(Phase::Reconciling as u8, Ordering::Release);
        Ok(true)
    }

    /// Phase 3: walk `secondary_index` (which held the live entries
    /// recorded by triggers during bulk sort), dropping anything the
    /// tracker says was concurrently deleted, then sweep the remaining
    /// tracker entries out of `new_index`.
    async fn reconcile(&self, txn: &dyn Txn) -> Result<()> {
        let Some(new_index) = self.new_index.read().unwrap().clone() else {
            warn!("reconcile called before new_index was published");
            return Ok(());
        };

        let secondary_index = self.secondary_index.read().unwrap().clone();
        let mut cursor = secondary_index.new_cursor(txn).await?;
        let mut has_more = cursor.first().await?;
        while has_more {
            let key = cursor.key().unwrap_or(&[]).to_vec();
            let tracked_deleted = self.deleted_tracker.load(txn, &key).await?.is_some();
            if tracked_deleted {
                self.deleted_tracker.delete(txn, &key).await?;
            } else {
                cursor.autoload().await?;
                let value = cursor.value().map(|v| v.to_vec());
                new_index.store(txn, &key, value.as_deref()).await?;
            }
            has_more = cursor.next().await?;
        }

        // Lock order secondary_index -> deleted_tracker is already
        // respected above; remaining sweep locks new_index per key.
        let mut tracker_cursor = self.deleted_tracker.new_cursor(txn).await?;
        let mut has_more = tracker_cursor.first().await?;
        while has_more {
            let key = tracker_cursor.key().unwrap_or(&[]).to_vec();
            let timeout = std::time::Duration::from_secs(0);
            let _ = new_index.lock_upgradable(txn, &key, timeout).await?;
            if self.deleted_tracker.load(txn, &key).await?.is_some() {
                new_index.delete(txn, &key).await?;
            }
            has_more = tracker_cursor.next().await?;
        }
        Ok(())
    }

    /// Phase 4: under the redo lock and with triggers held exclusively
    /// (the caller's responsibility -- this method just drains the tracker
    /// and performs the identity swap), `new_index` becomes the secondary
    /// and the old live index is retired.
    async fn swap(&self, txn: &dyn Txn) -> Result<()> {
        let mut cursor = self.deleted_tracker.new_cursor(txn).await?;
        let mut has_more = cursor.first().await?;
        while has_more {
            let key = cursor.key().unwrap_or(&[]).to_vec();
            self.deleted_tracker.delete(txn, &key).await?;
            has_more = cursor.next().await?;
        }

        let Some(new_index) = self.new_index.write().unwrap().take() else {
            warn!("swap called before finalize published new_index");
            return Ok(());
        };
        let old_index = std::mem::replace(&mut *self.secondary_index.write().unwrap(), new_index);
        *self.retired_index.write().unwrap() = Some(old_index);

        self.phase.store(Phase::Swapped as u8, Ordering::Release);
        Ok(())
    }

    /// Redo-log / trigger hook: a concurrent insert into the secondary
    /// key. Phase 1-2 it's a no-op (the trigger's own write already landed
    /// in `secondary_index`); phase 2+ it must also reach `new_index`.
    pub async fn inserted(&self, txn: &dyn Txn, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        if matches!(self.phase(), Phase::Stopped) {
            return Ok(());
        }
        if let Some(new_index) = self.new_index.read().unwrap().clone() {
            txn.enter().await?;
            let store_value = if value.is_empty() { None } else { Some(value.as_slice()) };
            let result = new_index.store(txn, &key, store_value).await;
            txn.exit().await?;
            result?;
        }
        self.deleted_tracker.delete(txn, &key).await.ok();
        Ok(())
    }

    /// Redo-log / trigger hook: a concurrent delete. Always records the
    /// key in `deleted_tracker` so phase 3's reconcile (or a later
    /// concurrent insert racing the tracker) sees it; phase 2+ also
    /// deletes directly from `new_index`.
    pub async fn deleted(&self, txn: &dyn Txn, key: Vec<u8>) -> Result<()> {
        if matches!(self.phase(), Phase::Stopped) {
            return Ok(());
        }
        self.deleted_tracker.store(txn, &key, Some(&[])).await?;
        if let Some(new_index) = self.new_index.read().unwrap().clone() {
            txn.enter().await?;
            let result = new_index.delete(txn, &key).await;
            txn.exit().await?;
            result?;
        }
        Ok(())
    }
}
