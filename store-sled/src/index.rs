//! `SledIndex`/`SledCursor`: the `Index`/`Cursor` impls backing one
//! `sled::Tree`. Grounded on `storage/sled/src/index.rs`'s `Index(Arc<..>)`
//! wrapper and `scan_index.rs`'s cursor-over-a-tree pattern; sled calls are
//! synchronous, so every method follows the teacher's
//! `task::spawn_blocking` bridge (`collection.rs`).

use crate::locks::LockTable;
use crate::txn::SledTxn;
use async_trait::async_trait;
use relstore_engine::{Cursor, Index, LockOutcome, Txn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

#[derive(Clone)]
pub struct SledIndex {
    name: String,
    tree: sled::Tree,
    locks: Arc<LockTable>,
}

impl SledIndex {
    pub fn open(name: impl Into<String>, tree: sled::Tree, locks: Arc<LockTable>) -> Self {
        SledIndex { name: name.into(), tree, locks }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &sled::Tree {
        &self.tree
    }

    fn namespaced(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + 1 + key.len());
        out.extend_from_slice(self.name.as_bytes());
        out.push(0);
        out.extend_from_slice(key);
        out
    }

    fn txn_of<'a>(&self, txn: &'a dyn Txn) -> Option<&'a SledTxn> {
        txn.as_any().downcast_ref::<SledTxn>()
    }
}

#[async_trait]
impl Index for SledIndex {
    type Cursor = SledCursor;

    async fn new_cursor(&self, _txn: &dyn Txn) -> anyhow::Result<Self::Cursor> {
        Ok(SledCursor::new(self.tree.clone()))
    }

    async fn load(&self, _txn: &dyn Txn, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        let tree = self.tree.clone();
        let key = key.to_vec();
        let result = task::spawn_blocking(move || tree.get(key)).await??;
        Ok(result.map(|v| v.to_vec()))
    }

    async fn store(&self, _txn: &dyn Txn, key: &[u8], value: Option<&[u8]>) -> anyhow::Result<()> {
        let tree = self.tree.clone();
        let key = key.to_vec();
        let value = value.map(|v| v.to_vec());
        task::spawn_blocking(move || -> sled::Result<()> {
            match value {
                Some(v) => {
                    tree.insert(key, v)?;
                }
                None => {
                    tree.remove(key)?;
                }
            }
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn insert(&self, _txn: &dyn Txn, key: &[u8], value: &[u8]) -> anyhow::Result<bool> {
        let tree = self.tree.clone();
        let key_v = key.to_vec();
        let value_v = value.to_vec();
        let result = task::spawn_blocking(move || tree.compare_and_swap(key_v, None::<&[u8]>, Some(value_v))).await??;
        Ok(result.is_ok())
    }

    async fn delete(&self, _txn: &dyn Txn, key: &[u8]) -> anyhow::Result<()> {
        let tree = self.tree.clone();
        let key = key.to_vec();
        task::spawn_blocking(move || tree.remove(key)).await??;
        Ok(())
    }

    async fn lock_upgradable(&self, txn: &dyn Txn, key: &[u8], timeout: Duration) -> anyhow::Result<LockOutcome> {
        let Some(sled_txn) = self.txn_of(txn) else {
            anyhow::bail!("lock_upgradable called with a transaction from a different store");
        };
        let namespaced = self.namespaced(key);
        let outcome = self.locks.lock_upgradable(&namespaced, sled_txn.id(), timeout).await;
        if outcome == LockOutcome::Acquired {
            sled_txn.remember_lock(&namespaced);
        }
        Ok(outcome)
    }
}

/// Sled iterates lazily but synchronously; `next`/`find` re-open a small
/// forward range each call rather than holding a live `sled::Iter` across
/// an await point (sled's iterator isn't `Send` in all versions, and the
/// `Cursor` trait requires it).
pub struct SledCursor {
    tree: sled::Tree,
    position: Option<Vec<u8>>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    started: bool,
}

impl SledCursor {
    fn new(tree: sled::Tree) -> Self {
        SledCursor { tree, position: None, current: None, started: false }
    }
}

#[async_trait]
impl Cursor for SledCursor {
    async fn first(&mut self) -> anyhow::Result<bool> {
        let tree = self.tree.clone();
        let first = task::spawn_blocking(move || tree.iter().next().transpose()).await??;
        self.started = true;
        self.current = first.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(self.current.is_some())
    }

    async fn next(&mut self) -> anyhow::Result<bool> {
        if !self.started {
            return self.first().await;
        }
        let Some(pos) = self.position.clone() else { return Ok(false) };
        let tree = self.tree.clone();
        let next = task::spawn_blocking(move || {
            let mut range = tree.range((std::ops::Bound::Excluded(pos), std::ops::Bound::Unbounded));
            range.next().transpose()
        })
        .await??;
        self.current = next.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(self.current.is_some())
    }

    async fn find(&mut self, key: &[u8]) -> anyhow::Result<bool> {
        self.started = true;
        let tree = self.tree.clone();
        let key_v = key.to_vec();
        let found = task::spawn_blocking(move || {
            let mut range = tree.range((std::ops::Bound::Included(key_v), std::ops::Bound::Unbounded));
            range.next().transpose()
        })
        .await??;
        let exact = found.as_ref().map(|(k, _)| k.as_ref() == key).unwrap_or(false);
        self.current = found.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(exact)
    }

    async fn find_nearby(&mut self, key: &[u8]) -> anyhow::Result<bool> {
        self.find(key).await
    }

    async fn last(&mut self) -> anyhow::Result<bool> {
        let tree = self.tree.clone();
        let last = task::spawn_blocking(move || tree.iter().next_back().transpose()).await??;
        self.started = true;
        self.current = last.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(self.current.is_some())
    }

    async fn prev(&mut self) -> anyhow::Result<bool> {
        if !self.started {
            return self.last().await;
        }
        let Some(pos) = self.position.clone() else { return Ok(false) };
        let tree = self.tree.clone();
        let prev = task::spawn_blocking(move || {
            let mut range = tree.range((std::ops::Bound::Unbounded, std::ops::Bound::Excluded(pos)));
            range.next_back().transpose()
        })
        .await??;
        self.current = prev.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(self.current.is_some())
    }

    async fn find_before(&mut self, key: &[u8]) -> anyhow::Result<bool> {
        self.started = true;
        let tree = self.tree.clone();
        let key_v = key.to_vec();
        let found = task::spawn_blocking(move || {
            let mut range = tree.range((std::ops::Bound::Unbounded, std::ops::Bound::Included(key_v)));
            range.next_back().transpose()
        })
        .await??;
        let exact = found.as_ref().map(|(k, _)| k.as_ref() == key).unwrap_or(false);
        self.current = found.map(|(k, v)| (k.to_vec(), v.to_vec()));
        self.position = self.current.as_ref().map(|(k, _)| k.clone());
        Ok(exact)
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    fn reset(&mut self) {
        self.position = None;
        self.current = None;
        self.started = false;
    }

    async fn autoload(&mut self) -> anyhow::Result<()> {
        // The full key/value pair is already fetched by `first`/`next`/
        // `find`; sled has no separate "load the value lazily" step.
        Ok(())
    }

    fn register(&mut self, _txn: &dyn Txn) {}

    fn link(&mut self, _txn: &dyn Txn) {}
}
