//! External sorter for backfill's bulk-sort phase (§4.7 phase 1). Sled
//! trees keep keys in byte order natively, so batching writes into a
//! throwaway tree *is* the sort -- no separate merge step is needed the
//! way an on-disk merge sort would require.

use async_trait::async_trait;
use relstore_engine::{Bytes, Sorter};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task;

pub struct SledSorter {
    tree: sled::Tree,
    name: String,
    live: AtomicBool,
}

impl SledSorter {
    pub fn open(db: &sled::Db, name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        let tree = db.open_tree(name.as_bytes())?;
        Ok(SledSorter { tree, name, live: AtomicBool::new(true) })
    }
}

#[async_trait]
impl Sorter for SledSorter {
    async fn add_batch(&self, entries: &[(Bytes, Bytes)]) -> anyhow::Result<()> {
        if !self.live.load(Ordering::Acquire) {
            anyhow::bail!("sorter closed");
        }
        let tree = self.tree.clone();
        let entries = entries.to_vec();
        task::spawn_blocking(move || -> sled::Result<()> {
            let mut batch = sled::Batch::default();
            for (k, v) in entries {
                batch.insert(k, v);
            }
            tree.apply_batch(batch)
        })
        .await??;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> anyhow::Result<Option<String>> {
        if !self.live.load(Ordering::Acquire) {
            return Ok(None);
        }
        self.tree.flush_async().await?;
        Ok(Some(self.name.clone()))
    }

    fn reset(&self) {
        self.live.store(false, Ordering::Release);
    }
}
