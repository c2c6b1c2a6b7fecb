use relstore_codec::Direction;
use serde::{Deserialize, Serialize};

/// One column of an index's key, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexKeyColumn {
    pub name: String,
    pub direction: Direction,
}

/// Describes one candidate index: the primary, an alternate key, or a plain
/// secondary (§3). The planner treats all three uniformly for scoring; C9
/// (transform maker) and C6 (triggers) are what actually build their
/// entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub key_columns: Vec<IndexKeyColumn>,
    /// Columns this index's value carries (covering columns); the primary
    /// key columns are implicitly covered by every non-alt secondary since
    /// they are appended to the key, and by every alt key since they are
    /// the value.
    pub covering_columns: Vec<String>,
    pub is_primary: bool,
    pub is_unique: bool,
}

impl IndexSpec {
    pub fn key_column_names(&self) -> impl Iterator<Item = &str> {
        self.key_columns.iter().map(|c| c.name.as_str())
    }

    /// All columns whose value can be read without a join to the primary.
    pub fn covers(&self, column: &str) -> bool {
        self.key_column_names().any(|c| c == column) || self.covering_columns.iter().any(|c| c == column)
    }

    pub fn is_covering(&self, columns: impl Iterator<Item = impl AsRef<str>>) -> bool {
        columns.map(|c| self.covers(c.as_ref())).all(|b| b)
    }
}
