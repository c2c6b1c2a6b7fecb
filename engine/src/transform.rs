//! Transform maker (C9): converts an encoded primary entry into one or
//! more encoded secondary entries in a single pass, sharing decode work
//! across every target that references the same column.

use crate::error::Result;
use crate::located::{LocatedColumns, Side};
use crate::row::RowInfo;
use relstore_codec::{lex, plain, ColumnDescriptor, Value};
use std::collections::HashMap;

/// Whether a column's value is already known without touching the encoded
/// primary bytes at all, is always absent from whatever's in hand and must
/// be decoded, or depends on a runtime check (e.g. a partially-populated
/// `RowBuilder`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Always,
    Never,
    Conditional,
}

#[derive(Debug, Clone)]
struct ColumnSource {
    availability: Availability,
    /// Index into the primary's key or value column list, and which side.
    side: Side,
    primary_index: usize,
}

/// One secondary row info the maker can produce an encoded entry for.
pub struct TransformTarget {
    pub id: usize,
    pub key_columns: Vec<ColumnDescriptor>,
    pub value_columns: Vec<ColumnDescriptor>,
    /// Must always be encoded (e.g. a unique alt key whose absence would
    /// be a correctness bug), as opposed to a target only built when the
    /// caller asks for it.
    pub eager: bool,
}

pub struct TransformMaker<'p> {
    primary: &'p RowInfo,
    targets: Vec<TransformTarget>,
    sources: HashMap<String, ColumnSource>,
}

impl<'p> TransformMaker<'p> {
    pub fn new(primary: &'p RowInfo) -> Self {
        TransformMaker { primary, targets: Vec::new(), sources: HashMap::new() }
    }

    fn register_sources(&mut self, columns: &[ColumnDescriptor]) {
        for col in columns {
            if self.sources.contains_key(&col.name) {
                continue;
            }
            let (side, primary_index) = if let Some(i) = self.primary.key_columns.iter().position(|c| c.name == col.name) {
                (Side::Key, i)
            } else if let Some(i) = self.primary.value_columns.iter().position(|c| c.name == col.name) {
                (Side::Value, i)
            } else {
                continue;
            };
            // A primitive column (or one whose encoding never needs to
            // change shape between primary and secondary) costs nothing to
            // decode-and-re-encode, so there's no point branching on
            // whether a row instance already has it in memory -- a binary
            // copy from the encoded bytes is simplest and just as cheap.
            let availability = if columns.iter().any(|c| c.name == col.name) && col.type_code.is_primitive() {
                Availability::Never
            } else {
                Availability::Conditional
            };
            self.sources.insert(col.name.clone(), ColumnSource { availability, side, primary_index });
        }
    }

    pub fn add_key_target(&mut self, key_columns: Vec<ColumnDescriptor>, eager: bool) -> usize {
        self.register_sources(&key_columns);
        let id = self.targets.len();
        self.targets.push(TransformTarget { id, key_columns, value_columns: vec![], eager });
        id
    }

    pub fn add_value_target(&mut self, key_columns: Vec<ColumnDescriptor>, value_columns: Vec<ColumnDescriptor>, eager: bool) -> usize {
        self.register_sources(&key_columns);
        self.register_sources(&value_columns);
        let id = self.targets.len();
        self.targets.push(TransformTarget { id, key_columns, value_columns, eager });
        id
    }

    pub fn availability(&self, column: &str) -> Option<Availability> {
        self.sources.get(column).map(|s| s.availability)
    }

    pub fn begin<'a>(&'a self, key: &'a [u8], value: &'a [u8]) -> TransformContext<'a> {
        TransformContext {
            maker: self,
            key: LocatedColumns::new(key, &self.primary.key_columns, Side::Key),
            value: LocatedColumns::new(value, &self.primary.value_columns, Side::Value),
            key_slice: key,
            value_slice: value,
        }
    }
}

pub struct TransformContext<'a> {
    maker: &'a TransformMaker<'a>,
    key: LocatedColumns<'a>,
    value: LocatedColumns<'a>,
    key_slice: &'a [u8],
    value_slice: &'a [u8],
}

impl<'a> TransformContext<'a> {
    fn decode(&mut self, name: &str) -> Result<Value> {
        let source = self.maker.sources.get(name).expect("column registered by add_*_target");
        let value = match source.side {
            Side::Key => self.key.decode(source.primary_index)?,
            Side::Value => self.value.decode(source.primary_index)?,
        };
        Ok(value.clone())
    }

    /// Tries a direct byte-slice copy when the target column's codec is
    /// bit-identical to the primary's for that column (skips decode and
    /// re-encode entirely).
    fn binary_copy(&mut self, name: &str, target: &ColumnDescriptor) -> Option<Result<Vec<u8>>> {
        let source = self.maker.sources.get(name)?;
        let primary_col = match source.side {
            Side::Key => &self.maker.primary.key_columns[source.primary_index],
            Side::Value => &self.maker.primary.value_columns[source.primary_index],
        };
        if primary_col.type_code != target.type_code
            || primary_col.direction != target.direction
            || primary_col.nulls != target.nulls
            || primary_col.nullable != target.nullable
        {
            return None;
        }
        let result = match source.side {
            Side::Key => self.key.locate(source.primary_index).map(|(s, e)| self.key_bytes(s, e)),
            Side::Value => self.value.locate(source.primary_index).map(|(s, e)| self.value_bytes(s, e)),
        };
        Some(result.map_err(Into::into))
    }

    fn key_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        self.key_buf()[start..end].to_vec()
    }

    fn value_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        self.value_buf()[start..end].to_vec()
    }

    fn key_buf(&self) -> &[u8] {
        self.key_slice
    }

    fn value_buf(&self) -> &[u8] {
        self.value_slice
    }

    pub fn encode(&mut self, target_id: usize) -> Result<(Vec<u8>, Vec<u8>)> {
        let target = &self.maker.targets[target_id];
        let mut key_out = Vec::new();
        for col in &target.key_columns {
            if let Some(copy) = self.binary_copy(&col.name, col) {
                key_out.extend_from_slice(&copy?);
                continue;
            }
            let v = self.decode(&col.name)?;
            lex::encode(&v, &col.type_code, col.direction, col.nulls, col.nullable, &mut key_out)?;
        }
        let mut value_out = Vec::new();
        for col in &target.value_columns {
            if let Some(copy) = self.binary_copy(&col.name, col) {
                value_out.extend_from_slice(&copy?);
                continue;
            }
            let v = self.decode(&col.name)?;
            plain::encode(&v, &col.type_code, col.nullable, &mut value_out)?;
        }
        Ok((key_out, value_out))
    }
}

/// Bitmap of which primary columns differ between a new and old encoded
/// row, packed as 64-bit words indexed by source slot (§4.9 "value-diff
/// mode"). Update triggers OR together the bits for each target's source
/// set to decide whether that target needs re-encoding at all.
pub struct ValueDiff {
    words: Vec<u64>,
    slot_of: HashMap<String, usize>,
}

impl ValueDiff {
    pub fn compute(primary: &RowInfo, new_key: &[u8], new_value: &[u8], old_key: &[u8], old_value: &[u8]) -> Result<Self> {
        let all_columns: Vec<(&ColumnDescriptor, Side)> = primary
            .key_columns
            .iter()
            .map(|c| (c, Side::Key))
            .chain(primary.value_columns.iter().map(|c| (c, Side::Value)))
            .collect();

        let mut new_key_located = LocatedColumns::new(new_key, &primary.key_columns, Side::Key);
        let mut new_value_located = LocatedColumns::new(new_value, &primary.value_columns, Side::Value);
        let mut old_key_located = LocatedColumns::new(old_key, &primary.key_columns, Side::Key);
        let mut old_value_located = LocatedColumns::new(old_value, &primary.value_columns, Side::Value);

        let mut words = vec![0u64; all_columns.len().div_ceil(64)];
        let mut slot_of = HashMap::new();

        for (slot, (col, side)) in all_columns.iter().enumerate() {
            slot_of.insert(col.name.clone(), slot);
            let idx = match side {
                Side::Key => primary.key_columns.iter().position(|c| c.name == col.name).unwrap(),
                Side::Value => primary.value_columns.iter().position(|c| c.name == col.name).unwrap(),
            };
            let differs = if col.type_code.is_primitive() {
                let new_v = match side {
                    Side::Key => new_key_located.decode(idx)?.clone(),
                    Side::Value => new_value_located.decode(idx)?.clone(),
                };
                let old_v = match side {
                    Side::Key => old_key_located.decode(idx)?.clone(),
                    Side::Value => old_value_located.decode(idx)?.clone(),
                };
                new_v != old_v
            } else {
                let (ns, ne) = match side {
                    Side::Key => new_key_located.locate(idx)?,
                    Side::Value => new_value_located.locate(idx)?,
                };
                let (os, oe) = match side {
                    Side::Key => old_key_located.locate(idx)?,
                    Side::Value => old_value_located.locate(idx)?,
                };
                let new_bytes = match side {
                    Side::Key => &new_key[ns..ne],
                    Side::Value => &new_value[ns..ne],
                };
                let old_bytes = match side {
                    Side::Key => &old_key[os..oe],
                    Side::Value => &old_value[os..oe],
                };
                new_bytes != old_bytes
            };
            if differs {
                words[slot / 64] |= 1 << (slot % 64);
            }
        }
        Ok(ValueDiff { words, slot_of })
    }

    /// `true` if any column in `columns` differs; a target whose full
    /// source-column set returns `false` here can skip re-encoding.
    pub fn any_changed<'s>(&self, columns: impl Iterator<Item = &'s str>) -> bool {
        columns.filter_map(|c| self.slot_of.get(c)).any(|slot| self.words[slot / 64] & (1 << (slot % 64)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore_codec::{lex, plain, ColumnType, Direction, NullsOrder};

    fn primary() -> RowInfo {
        RowInfo {
            row_type: "user".into(),
            version: 1,
            key_columns: vec![ColumnDescriptor::key("id", ColumnType::U64, Direction::Asc, NullsOrder::Low, 0)],
            value_columns: vec![
                ColumnDescriptor::value("email", ColumnType::Utf8, false, 0),
                ColumnDescriptor::value("age", ColumnType::U32, false, 1),
            ],
        }
    }

    fn encode_row(id: u64, email: &str, age: u32) -> (Vec<u8>, Vec<u8>) {
        let mut key = Vec::new();
        lex::encode(&Value::U64(id), &ColumnType::U64, Direction::Asc, NullsOrder::Low, false, &mut key).unwrap();
        let mut value = Vec::new();
        plain::encode(&Value::Utf8(email.to_string()), &ColumnType::Utf8, false, &mut value).unwrap();
        plain::encode(&Value::U32(age), &ColumnType::U32, false, &mut value).unwrap();
        (key, value)
    }

    #[test]
    fn alt_key_target_encodes_email_to_id() {
        let primary = primary();
        let mut maker = TransformMaker::new(&primary);
        let alt_key_columns = vec![ColumnDescriptor::key("email", ColumnType::Utf8, Direction::Asc, NullsOrder::Low, 0)];
        let alt_value_columns = vec![ColumnDescriptor::value("id", ColumnType::U64, false, 0)];
        let target = maker.add_value_target(alt_key_columns, alt_value_columns, true);

        let (key, value) = encode_row(7, "a@example.com", 30);
        let mut ctx = maker.begin(&key, &value);
        let (enc_key, enc_value) = ctx.encode(target).unwrap();

        let (decoded_email, _) = lex::decode(&enc_key, &ColumnType::Utf8, Direction::Asc, NullsOrder::Low, false).unwrap();
        assert_eq!(decoded_email, Value::Utf8("a@example.com".to_string()));
        let (decoded_id, _) = plain::decode(&enc_value, &ColumnType::U64, false).unwrap();
        assert_eq!(decoded_id, Value::U64(7));
    }

    #[test]
    fn binary_copy_skips_decode_for_matching_primitive_codec() {
        let primary = primary();
        let mut maker = TransformMaker::new(&primary);
        let covering_key = vec![ColumnDescriptor::key("age", ColumnType::U32, Direction::Asc, NullsOrder::Low, 0)];
        let target = maker.add_key_target(covering_key, false);

        assert_eq!(maker.availability("age"), Some(Availability::Never));

        let (key, value) = encode_row(1, "x@example.com", 42);
        let mut ctx = maker.begin(&key, &value);
        let (enc_key, _) = ctx.encode(target).unwrap();
        let (decoded_age, _) = lex::decode(&enc_key, &ColumnType::U32, Direction::Asc, NullsOrder::Low, false).unwrap();
        assert_eq!(decoded_age, Value::U32(42));
    }

    #[test]
    fn value_diff_flags_only_changed_columns() {
        let primary = primary();
        let (old_key, old_value) = encode_row(1, "a@example.com", 30);
        let (new_key, new_value) = encode_row(1, "a@example.com", 31);

        let diff = ValueDiff::compute(&primary, &new_key, &new_value, &old_key, &old_value).unwrap();
        assert!(diff.any_changed(["age"].into_iter()));
        assert!(!diff.any_changed(["email"].into_iter()));
        assert!(!diff.any_changed(["id"].into_iter()));
    }
}
