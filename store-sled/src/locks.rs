//! A process-local upgradable-lock table keyed by `(index name, key)`,
//! standing in for the distributed lock manager a real store/cluster
//! would use. Grounded on the teacher's `storage/sled` which likewise
//! layers its own concurrency primitives on top of sled's tree-level
//! atomicity (sled itself has no cross-key lock concept).

use relstore_engine::LockOutcome;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(pub u64);

struct Entry {
    owner: TxnId,
}

#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<Vec<u8>, Entry>>,
    notify: Notify,
}

impl LockTable {
    pub fn new() -> Self {
        LockTable { entries: Mutex::new(HashMap::new()), notify: Notify::new() }
    }

    /// Mirrors §4.8's `lock_upgradable(key, timeout)`: acquires immediately
    /// if free or already owned by `owner`, otherwise waits up to `timeout`
    /// for the holder to release, polling against `Notify` wake-ups from
    /// `unlock`.
    pub async fn lock_upgradable(&self, key: &[u8], owner: TxnId, timeout: Duration) -> LockOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut entries = self.entries.lock().unwrap();
                match entries.get(key) {
                    Some(e) if e.owner == owner => return LockOutcome::Acquired,
                    Some(_) => {}
                    None => {
                        entries.insert(key.to_vec(), Entry { owner });
                        return LockOutcome::Acquired;
                    }
                }
            }
            if Instant::now() >= deadline {
                return LockOutcome::TimedOut;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return LockOutcome::TimedOut;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }
    }

    pub fn unlock(&self, key: &[u8], owner: TxnId) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(e) = entries.get(key) {
            if e.owner == owner {
                entries.remove(key);
            }
        }
        drop(entries);
        self.notify.notify_waiters();
    }

    /// Reassigns every lock `other_owner` holds on `key` to `owner`
    /// (`Txn::unlock_combine`'s "a cursor's lifetime outlives the
    /// transaction that created it" case).
    pub fn combine(&self, key: &[u8], owner: TxnId, other_owner: TxnId) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(e) = entries.get_mut(key) {
            if e.owner == other_owner {
                e.owner = owner;
            }
        }
    }
}

pub fn shared_table() -> Arc<LockTable> {
    Arc::new(LockTable::new())
}
