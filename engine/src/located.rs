//! Lazy column location and decoding (§4.4): `located_keys[]`/`located_values[]`
//! arrays of `LocatedColumn` states, as the design notes call for in place of
//! runtime codegen.

use crate::error::Result;
use relstore_codec::{lex, plain, ColumnDescriptor, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnState {
    Unlocated,
    Located { start: usize, end: usize },
    Decoded { start: usize, end: usize, value: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Key,
    Value,
}

/// Sequentially locates and decodes columns of one side (key or value) of
/// one row, caching each column's byte range and decoded value as they're
/// discovered. Variable-width encodings mean locating column `i` requires
/// having already located columns `0..i`, so `scanned_through` tracks how
/// far the cursor has walked.
pub struct LocatedColumns<'a> {
    buf: &'a [u8],
    columns: &'a [ColumnDescriptor],
    side: Side,
    states: Vec<ColumnState>,
    scanned_through: usize,
    scanned_count: usize,
}

impl<'a> LocatedColumns<'a> {
    pub fn new(buf: &'a [u8], columns: &'a [ColumnDescriptor], side: Side) -> Self {
        LocatedColumns { buf, columns, side, states: vec![ColumnState::Unlocated; columns.len()], scanned_through: 0, scanned_count: 0 }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn skip_one(&self, col: &ColumnDescriptor, at: usize) -> Result<usize> {
        let slice = &self.buf[at..];
        match self.side {
            Side::Key => Ok(lex::decode_skip(slice, &col.type_code, col.direction, col.nulls, col.nullable)?),
            Side::Value => {
                let (_, n) = plain::decode(slice, &col.type_code, col.nullable)?;
                Ok(n)
            }
        }
    }

    fn decode_one(&self, col: &ColumnDescriptor, at: usize) -> Result<(Value, usize)> {
        let slice = &self.buf[at..];
        match self.side {
            Side::Key => Ok(lex::decode(slice, &col.type_code, col.direction, col.nulls, col.nullable)?),
            Side::Value => Ok(plain::decode(slice, &col.type_code, col.nullable)?),
        }
    }

    /// Ensures columns `0..=idx` have known byte ranges, without decoding
    /// any of their values.
    pub fn locate(&mut self, idx: usize) -> Result<(usize, usize)> {
        while self.scanned_count <= idx {
            let col = &self.columns[self.scanned_count];
            let start = self.scanned_through;
            let n = self.skip_one(col, start)?;
            let end = start + n;
            self.states[self.scanned_count] = ColumnState::Located { start, end };
            self.scanned_through = end;
            self.scanned_count += 1;
        }
        match &self.states[idx] {
            ColumnState::Located { start, end } => Ok((*start, *end)),
            ColumnState::Decoded { start, end, .. } => Ok((*start, *end)),
            ColumnState::Unlocated => unreachable!("locate loop guarantees this index is located"),
        }
    }

    /// Ensures column `idx` has a materialized `Value`, returning it by
    /// reference. Previously located-but-undecoded state is promoted in
    /// place instead of re-scanning from the start.
    pub fn decode(&mut self, idx: usize) -> Result<&Value> {
        if matches!(self.states[idx], ColumnState::Decoded { .. }) {
            return Ok(match &self.states[idx] {
                ColumnState::Decoded { value, .. } => value,
                _ => unreachable!(),
            });
        }
        let (start, _) = self.locate(idx)?;
        let col = &self.columns[idx];
        let (value, _) = self.decode_one(col, start)?;
        let end = match self.states[idx] {
            ColumnState::Located { end, .. } => end,
            _ => unreachable!(),
        };
        self.states[idx] = ColumnState::Decoded { start, end, value };
        match &self.states[idx] {
            ColumnState::Decoded { value, .. } => Ok(value),
            _ => unreachable!(),
        }
    }

    pub fn byte_range(&self, idx: usize) -> Option<(usize, usize)> {
        match &self.states[idx] {
            ColumnState::Located { start, end } => Some((*start, *end)),
            ColumnState::Decoded { start, end, .. } => Some((*start, *end)),
            ColumnState::Unlocated => None,
        }
    }

    /// A snapshot of the current cache state, used by the evaluator to
    /// restore sibling-branch state per the `AndFilter`/`OrFilter`
    /// leftmost-path rule (§4.4).
    pub fn snapshot(&self) -> Vec<ColumnState> {
        self.states.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<ColumnState>) {
        // A restored snapshot may be a strict prefix of progress compared
        // to what a sibling branch discovered; `scanned_count`/`scanned_through`
        // must roll back with it so later `locate` calls re-derive the
        // dropped tail instead of trusting stale offsets.
        let scanned_count = snapshot.iter().take_while(|s| !matches!(s, ColumnState::Unlocated)).count();
        self.scanned_through = match snapshot.get(scanned_count.wrapping_sub(1)) {
            Some(ColumnState::Located { end, .. }) | Some(ColumnState::Decoded { end, .. }) => *end,
            _ => 0,
        };
        self.scanned_count = scanned_count;
        self.states = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore_codec::{ColumnType, Direction, NullsOrder};

    #[test]
    fn locates_columns_in_order() {
        let columns = vec![
            ColumnDescriptor::key("a", ColumnType::I32, Direction::Asc, NullsOrder::Low, 0),
            ColumnDescriptor::key("b", ColumnType::U8, Direction::Asc, NullsOrder::Low, 1),
        ];
        let mut buf = Vec::new();
        lex::encode(&Value::I32(7), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut buf).unwrap();
        lex::encode(&Value::U8(9), &ColumnType::U8, Direction::Asc, NullsOrder::Low, false, &mut buf).unwrap();

        let mut located = LocatedColumns::new(&buf, &columns, Side::Key);
        assert_eq!(*located.decode(1).unwrap(), Value::U8(9));
        assert_eq!(*located.decode(0).unwrap(), Value::I32(7));
    }

    #[test]
    fn snapshot_restore_rolls_back_progress() {
        let columns = vec![
            ColumnDescriptor::key("a", ColumnType::I32, Direction::Asc, NullsOrder::Low, 0),
            ColumnDescriptor::key("b", ColumnType::U8, Direction::Asc, NullsOrder::Low, 1),
        ];
        let mut buf = Vec::new();
        lex::encode(&Value::I32(7), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut buf).unwrap();
        lex::encode(&Value::U8(9), &ColumnType::U8, Direction::Asc, NullsOrder::Low, false, &mut buf).unwrap();

        let mut located = LocatedColumns::new(&buf, &columns, Side::Key);
        let before = located.snapshot();
        located.decode(1).unwrap();
        located.restore(before);
        assert_eq!(located.scanned_count, 0);
        assert_eq!(*located.decode(1).unwrap(), Value::U8(9));
    }
}
