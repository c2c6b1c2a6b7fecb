//! `SledStore`: opens a sled database and hands out `SledIndex`/`SledTxn`
//! instances. Grounded on `storage/sled/src/engine.rs`'s
//! `SledStorageEngine::with_path`/`new_test` constructors.

use crate::index::SledIndex;
use crate::locks::{shared_table, LockTable};
use crate::txn::SledTxn;
use relstore_engine::{Durability, LockMode};
use std::path::PathBuf;
use std::sync::Arc;

pub struct SledStore {
    db: sled::Db,
    locks: Arc<LockTable>,
}

impl SledStore {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&path)?;
        let db = sled::open(path.join("sled"))?;
        Ok(SledStore { db, locks: shared_table() })
    }

    pub fn open_temporary() -> anyhow::Result<Self> {
        let db = sled::Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(SledStore { db, locks: shared_table() })
    }

    pub fn with_homedir_folder(folder_name: &str) -> anyhow::Result<Self> {
        let dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("failed to get home directory"))?.join(folder_name);
        Self::open(dir)
    }

    pub fn index(&self, name: &str) -> anyhow::Result<SledIndex> {
        let tree = self.db.open_tree(name)?;
        Ok(SledIndex::open(name, tree, self.locks.clone()))
    }

    pub fn drop_index(&self, name: &str) -> anyhow::Result<()> {
        self.db.drop_tree(name)?;
        Ok(())
    }

    pub fn begin(&self, lock_mode: LockMode, durability: Durability) -> SledTxn {
        SledTxn::new(lock_mode, durability, self.locks.clone())
    }
}
