//! Row info, schema registry, and the alternate-key value ordering rule (C2).

use crate::error::{EngineError, Result};
use relstore_codec::{ColumnDescriptor, ColumnType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Describes one row type at one schema version: its key columns (in key
/// order) and its value columns (in the order they were encoded at that
/// version). Immutable once registered — evolution produces a new
/// `RowInfo`, never a mutation of an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct RowInfo {
    pub row_type: String,
    pub version: u32,
    pub key_columns: Vec<ColumnDescriptor>,
    pub value_columns: Vec<ColumnDescriptor>,
}

impl RowInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.key_columns.iter().chain(self.value_columns.iter()).find(|c| c.name == name)
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key_columns.iter().any(|c| c.name == name)
    }
}

/// Declares a row type's columns before any version is registered. The
/// registry assigns the version number and freezes the column order.
#[derive(Debug, Clone)]
pub struct RowTypeDescription {
    pub row_type: String,
    pub key_columns: Vec<ColumnDescriptor>,
    pub value_columns: Vec<ColumnDescriptor>,
}

/// Orders an alternate key's value columns per §4.2: fixed-size primitives
/// first, then the primary key's column order (so a join can be done by
/// `memcpy` reusing the primary's codecs), then remaining columns
/// lexicographically by name.
pub fn order_alt_key_value_columns(candidate_columns: &[ColumnDescriptor], primary_key_columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    let mut primitives: Vec<ColumnDescriptor> = Vec::new();
    let mut pk_order: Vec<ColumnDescriptor> = Vec::new();
    let mut rest: Vec<ColumnDescriptor> = Vec::new();

    let pk_names: Vec<&str> = primary_key_columns.iter().map(|c| c.name.as_str()).collect();

    for col in candidate_columns {
        if pk_names.contains(&col.name.as_str()) {
            continue;
        }
        if col.type_code.is_fixed_width() {
            primitives.push(col.clone());
        }
    }
    for pk in primary_key_columns {
        if let Some(col) = candidate_columns.iter().find(|c| c.name == pk.name) {
            pk_order.push(col.clone());
        } else {
            // The alt key's value slot always carries the primary key even
            // when it wasn't in the candidate list explicitly.
            pk_order.push(pk.clone());
        }
    }
    for col in candidate_columns {
        if pk_names.contains(&col.name.as_str()) || col.type_code.is_fixed_width() {
            continue;
        }
        rest.push(col.clone());
    }
    rest.sort_by(|a, b| a.name.cmp(&b.name));

    primitives.into_iter().chain(pk_order).chain(rest).collect()
}

/// A `(row_type, version)` keyed registry of immutable `RowInfo`s (C2's
/// `describe`/`register_version`/`lookup`). Weakly-cached in the source
/// design; here a plain `RwLock<HashMap>` suffices since `RowInfo` is cheap
/// to keep and the registry's lifetime matches the engine's.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    inner: RwLock<HashMap<(String, u32), Arc<RowInfo>>>,
    next_version: RwLock<HashMap<String, u32>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry { inner: RwLock::new(HashMap::new()), next_version: RwLock::new(HashMap::new()) }
    }

    /// `describe`: builds a `RowInfo` without registering it, for callers
    /// that only need to inspect column shape (e.g. the planner building
    /// `IndexSpec`s).
    pub fn describe(&self, desc: &RowTypeDescription, version: u32) -> RowInfo {
        RowInfo {
            row_type: desc.row_type.clone(),
            version,
            key_columns: desc.key_columns.clone(),
            value_columns: desc.value_columns.clone(),
        }
    }

    /// Registers a new version for a row type, additive and
    /// reordering-tolerant: the caller supplies the full value-column list
    /// for the new version, and the codec set recorded for every prior
    /// version is left untouched in the registry.
    pub fn register_version(&self, desc: RowTypeDescription) -> u32 {
        let version = {
            let mut next = self.next_version.write().unwrap();
            let entry = next.entry(desc.row_type.clone()).or_insert(1);
            let v = *entry;
            *entry += 1;
            v
        };
        let info = Arc::new(RowInfo {
            row_type: desc.row_type.clone(),
            version,
            key_columns: desc.key_columns,
            value_columns: desc.value_columns,
        });
        self.inner.write().unwrap().insert((desc.row_type, version), info);
        version
    }

    pub fn lookup(&self, row_type: &str, version: u32) -> Result<Arc<RowInfo>> {
        self.inner
            .read()
            .unwrap()
            .get(&(row_type.to_string(), version))
            .cloned()
            .ok_or(EngineError::UnknownSchemaVersion(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore_codec::{Direction, NullsOrder};

    fn desc(row_type: &str, value_columns: Vec<ColumnDescriptor>) -> RowTypeDescription {
        RowTypeDescription {
            row_type: row_type.to_string(),
            key_columns: vec![ColumnDescriptor::key("id", ColumnType::U64, Direction::Asc, NullsOrder::Low, 0)],
            value_columns,
        }
    }

    #[test]
    fn register_and_lookup_round_trips() {
        let reg = SchemaRegistry::new();
        let v = reg.register_version(desc("widget", vec![ColumnDescriptor::value("name", ColumnType::Utf8, false, 0)]));
        let info = reg.lookup("widget", v).unwrap();
        assert_eq!(info.value_columns.len(), 1);
    }

    #[test]
    fn unknown_version_errors() {
        let reg = SchemaRegistry::new();
        assert!(matches!(reg.lookup("widget", 99), Err(EngineError::UnknownSchemaVersion(99))));
    }

    #[test]
    fn alt_key_value_order_primitives_then_primary_then_rest() {
        let pk = vec![ColumnDescriptor::key("id", ColumnType::U64, Direction::Asc, NullsOrder::Low, 0)];
        let candidates = vec![
            ColumnDescriptor::value("bio", ColumnType::Utf8, false, 0),
            ColumnDescriptor::value("age", ColumnType::U32, false, 1),
            ColumnDescriptor::value("id", ColumnType::U64, false, 2),
            ColumnDescriptor::value("alias", ColumnType::Utf8, false, 3),
        ];
        let ordered = order_alt_key_value_columns(&candidates, &pk);
        let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["age", "id", "alias", "bio"]);
    }
}
