//! Secondary-index triggers (C6): insert/delete/update propagation from a
//! primary-table mutation to its secondary indexes, predicate locks, and
//! the reader/writer latch that lets a schema change swap a trigger's
//! secondary set without ever exposing a half-configured trigger.

use crate::backfill::Backfill;
use crate::error::{EngineError, Result};
use crate::planner_types::IndexKind;
use crate::row::RowInfo;
use crate::store_trait::{Index, LockOutcome, Txn};
use crate::transform::{TransformMaker, ValueDiff};
use relstore_planner::IndexSpec;
use std::sync::{Arc, RwLock, Weak};
use std::time::{Duration, Instant};
use tracing::warn;

/// Declares one secondary target the trigger maintains.
///
/// `backfill` is held weakly: per §5's cyclic-structure note, a trigger and
/// its backfill reference each other for the run's duration, and only the
/// row-store holds the strong `Arc` that keeps a `Backfill` alive.
pub struct SecondaryTarget<I: Index> {
    pub spec: IndexSpec,
    pub kind: IndexKind,
    pub index: Arc<I>,
    pub row_info: RowInfo,
    pub backfill: RwLock<Option<Weak<Backfill<I>>>>,
}

/// The reader/writer latch described in §4.6: ordinary writes take the
/// shared side; swapping in a new target list (schema change) takes the
/// exclusive side. `std::sync::RwLock` maps onto this directly.
pub struct Trigger<I: Index> {
    targets: RwLock<Vec<Arc<SecondaryTarget<I>>>>,
    primary: RowInfo,
}

impl<I: Index> Trigger<I> {
    pub fn new(primary: RowInfo, targets: Vec<Arc<SecondaryTarget<I>>>) -> Self {
        Trigger { targets: RwLock::new(targets), primary }
    }

    pub fn swap_targets(&self, targets: Vec<Arc<SecondaryTarget<I>>>) {
        *self.targets.write().unwrap() = targets;
    }

    fn targets_snapshot(&self) -> Vec<Arc<SecondaryTarget<I>>> {
        self.targets.read().unwrap().clone()
    }

    /// Builds one `TransformMaker` with a target registered per secondary,
    /// in the same order as `targets` so target id `i` always corresponds
    /// to `targets[i]`.
    fn build_maker<'p>(&'p self, targets: &[Arc<SecondaryTarget<I>>]) -> TransformMaker<'p> {
        let mut maker = TransformMaker::new(&self.primary);
        for target in targets {
            if target.row_info.value_columns.is_empty() {
                maker.add_key_target(target.row_info.key_columns.clone(), target.kind == IndexKind::AltKey);
            } else {
                maker.add_value_target(target.row_info.key_columns.clone(), target.row_info.value_columns.clone(), target.kind == IndexKind::AltKey);
            }
        }
        maker
    }

    pub async fn insert(&self, txn: &dyn Txn, key: &[u8], value: &[u8]) -> Result<()> {
        let targets = self.targets_snapshot();
        let maker = self.build_maker(&targets);
        let mut ctx = maker.begin(key, value);

        for (id, target) in targets.iter().enumerate() {
            let (k, v) = ctx.encode(id)?;

            acquire_predicate_lock(target.index.as_ref(), &target.spec.name, txn, &k).await?;

            let store_result = match target.kind {
                IndexKind::AltKey => match target.index.insert(txn, &k, &v).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(EngineError::UniqueConstraint { index: target.spec.name.clone() }),
                    Err(e) => swallow_if_dropped(e, &target.spec.name),
                },
                IndexKind::PlainSecondary => match target.index.store(txn, &k, Some(&v)).await {
                    Ok(()) => Ok(()),
                    Err(e) => swallow_if_dropped(e, &target.spec.name),
                },
            };
            store_result?;

            if let Some(backfill) = target.backfill.read().unwrap().as_ref().and_then(Weak::upgrade) {
                backfill.inserted(txn, k, v).await?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, txn: &dyn Txn, key: &[u8], value: &[u8]) -> Result<()> {
        let targets = self.targets_snapshot();
        let maker = self.build_maker(&targets);
        let mut ctx = maker.begin(key, value);

        for (id, target) in targets.iter().enumerate() {
            let (k, _v) = ctx.encode(id)?;

            if let Err(e) = target.index.store(txn, &k, None).await {
                swallow_if_dropped(e, &target.spec.name)?;
            }

            if let Some(backfill) = target.backfill.read().unwrap().as_ref().and_then(Weak::upgrade) {
                backfill.deleted(txn, k).await?;
            }
        }
        Ok(())
    }

    pub async fn update(&self, txn: &dyn Txn, new_key: &[u8], new_value: &[u8], old_key: &[u8], old_value: &[u8]) -> Result<()> {
        let targets = self.targets_snapshot();
        let diff = ValueDiff::compute(&self.primary, new_key, new_value, old_key, old_value)?;
        let maker = self.build_maker(&targets);
        let mut new_ctx = maker.begin(new_key, new_value);
        let mut old_ctx = maker.begin(old_key, old_value);

        for (id, target) in targets.iter().enumerate() {
            let source_cols: Vec<&str> =
                target.row_info.key_columns.iter().chain(target.row_info.value_columns.iter()).map(|c| c.name.as_str()).collect();
            if !diff.any_changed(source_cols.iter().copied()) {
                // Nothing this target depends on changed -- nothing to do,
                // whether or not its key is drawn from the primary key.
                continue;
            }

            let (new_k, new_v) = new_ctx.encode(id)?;
            let (old_k, old_v) = old_ctx.encode(id)?;

            let covering = !target.row_info.value_columns.is_empty();
            let key_changed = new_k != old_k;
            let value_changed = new_v != old_v;

            if !key_changed && !(covering && value_changed) {
                continue;
            }

            acquire_predicate_lock(target.index.as_ref(), &target.spec.name, txn, &new_k).await?;

            let insert_result = match target.kind {
                IndexKind::AltKey => target.index.insert(txn, &new_k, &new_v).await.map(|_| ()),
                IndexKind::PlainSecondary => target.index.store(txn, &new_k, Some(&new_v)).await,
            };
            if let Err(e) = insert_result {
                swallow_if_dropped(e, &target.spec.name)?;
            }

            // Covering-index optimization: if the key is unchanged and
            // only the value differs, the insert above already overwrote
            // the entry in place -- no delete needed.
            if key_changed {
                if let Err(e) = target.index.store(txn, &old_k, None).await {
                    swallow_if_dropped(e, &target.spec.name)?;
                }
            }
        }
        Ok(())
    }
}

/// Acquires the secondary's predicate lock over an encoded entry before a
/// write (§4.6 "Predicate locks"), probing with a zero timeout and backing
/// off until the transaction's own lock deadline, the same pattern the
/// auto-key generator uses against the same trait method.
async fn acquire_predicate_lock<I: Index>(index: &I, index_name: &str, txn: &dyn Txn, key: &[u8]) -> Result<()> {
    let lock_timeout = txn.lock_timeout();
    let deadline = lock_timeout.map(|d| Instant::now() + d);
    loop {
        let outcome = index.lock_upgradable(txn, key, Duration::from_secs(0)).await.map_err(EngineError::Store)?;
        if outcome == LockOutcome::Acquired {
            return Ok(());
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::LockFailure {
                    duration: lock_timeout.unwrap_or_default(),
                    detail: format!("could not acquire predicate lock on index {index_name}"),
                });
            }
        }
        tokio::task::yield_now().await;
    }
}

/// `DeletedIndex`/`ClosedIndex` during a secondary write is swallowed: the
/// trigger will be replaced shortly by the schema-change path, so the
/// in-flight write just no-ops for that one target. Any other error (a
/// genuine lock failure, malformed encoding, or store I/O error) must
/// propagate -- swallowing it would silently break §5's atomicity guarantee.
fn swallow_if_dropped(err: anyhow::Error, index_name: &str) -> Result<()> {
    let is_drop = matches!(err.downcast_ref::<EngineError>(), Some(EngineError::ClosedIndex(_)) | Some(EngineError::DeletedIndex(_)));
    if is_drop {
        warn!(index = index_name, error = %err, "secondary index write failed, assuming concurrent drop");
        Ok(())
    } else {
        Err(EngineError::Store(err))
    }
}
