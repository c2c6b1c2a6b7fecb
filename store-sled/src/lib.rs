//! A sled-backed implementation of the engine crate's `Store` contract
//! (§6): `SledIndex`/`SledCursor` for indexes and scans, `SledTxn` for
//! transactions and locks, and `SledSorter` for backfill's bulk-sort phase.

pub mod engine;
pub mod error;
pub mod index;
pub mod locks;
pub mod sorter;
pub mod txn;

pub use engine::SledStore;
pub use error::{Result, SledStoreError};
pub use index::{SledCursor, SledIndex};
pub use locks::{LockTable, TxnId};
pub use sorter::SledSorter;
pub use txn::SledTxn;
