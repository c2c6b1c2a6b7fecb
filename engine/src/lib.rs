//! Row/schema model, decode-and-evaluate scan engine, secondary-index
//! triggers, online backfill, and automatic key generation for the
//! relational table layer (C2, C4-C9).

pub mod autokey;
pub mod backfill;
pub mod error;
pub mod evaluator;
pub mod located;
pub mod planner_types;
pub mod row;
pub mod scan;
pub mod store_trait;
pub mod transform;
pub mod trigger;

pub use autokey::{AutoKeyGenerator, KeyRange};
pub use backfill::Backfill;
pub use error::{EngineError, Result, ScanStopped};
pub use evaluator::{RowEvaluator, StopColumn, Verdict};
pub use located::{LocatedColumns, Side};
pub use planner_types::IndexKind;
pub use row::{order_alt_key_value_columns, RowInfo, RowTypeDescription, SchemaRegistry};
pub use scan::{Bound, Characteristic, ScanController};
pub use store_trait::{Cursor, Durability, Index, LockMode, LockOutcome, RedoListener, Sorter, Txn};
pub use transform::{Availability, TransformContext, TransformMaker, TransformTarget, ValueDiff};
pub use trigger::{SecondaryTarget, Trigger};
