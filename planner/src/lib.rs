//! Index scoring and scan planning (§4.3-§4.4): turns a normalized filter
//! plus a candidate set of indexes into one or more concrete scan plans.

pub mod index_spec;
pub mod ordering;
pub mod plan;
pub mod scoring;

pub use index_spec::{IndexKeyColumn, IndexSpec};
pub use plan::{Plan, Planner, ScanBound};
pub use scoring::{score_index, IndexScore};
