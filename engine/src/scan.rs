//! Scan controller (C5): wraps a bounded, possibly-reversed view of one
//! index and chains to the next disjoint range the planner emitted.

use crate::error::Result;
use crate::evaluator::{RowEvaluator, Verdict};
use crate::row::RowInfo;
use crate::store_trait::{Cursor, Index, Txn};
use relstore_codec::Value;
use relstore_query::ast::Predicate;
use std::cell::Cell;

/// A scan characteristic bit, mirroring the source's `Scanner.characteristics()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Ordered,
    NonNull,
    Concurrent,
    Distinct,
    Sized,
    Sorted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
    Unbounded,
}

pub struct ScanController<'a, I: Index> {
    index: &'a I,
    low: Bound,
    high: Bound,
    reverse: bool,
    evaluator: RowEvaluator<'a>,
    characteristics: Vec<Characteristic>,
    next: Option<Box<ScanController<'a, I>>>,
    /// Set by `new_cursor` when it leaves the cursor positioned on a row
    /// already known to be in range; the next `advance()` must evaluate
    /// that row instead of stepping past it first.
    primed: Cell<bool>,
}

impl<'a, I: Index> ScanController<'a, I> {
    pub fn new(index: &'a I, low: Bound, high: Bound, reverse: bool, row_info: &'a RowInfo, residual: &'a Predicate) -> Self {
        let evaluator = RowEvaluator::new(row_info, residual, None);
        let mut characteristics = vec![Characteristic::Ordered, Characteristic::NonNull, Characteristic::Concurrent];
        if !reverse {
            characteristics.push(Characteristic::Sorted);
        }
        ScanController { index, low, high, reverse, evaluator, characteristics, next: None, primed: Cell::new(false) }
    }

    pub fn with_stop_column(mut self, stop_column: crate::evaluator::StopColumn) -> Self {
        self.evaluator = self.evaluator.with_stop_column(stop_column);
        self
    }

    pub fn chain(mut self, next: ScanController<'a, I>) -> Self {
        // Chaining more than one disjoint range disables the single-index
        // natural-order shortcut (§4.3 "multi-group handling"): the union
        // of ranges is no longer globally sorted even if each range is.
        self.characteristics.retain(|c| *c != Characteristic::Sorted);
        self.next = Some(Box::new(next));
        self
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// Positions a fresh cursor on the first row the scan should evaluate:
    /// `last()`/`find_before()` for a reverse scan, `first()`/`find()` for
    /// a forward one. Marks the controller primed so the first `advance()`
    /// call evaluates this row instead of stepping past it.
    pub async fn new_cursor(&self, txn: &dyn Txn) -> Result<I::Cursor> {
        let mut cursor = self.index.new_cursor(txn).await?;
        let (first_bound, second_bound) = if self.reverse { (&self.high, &self.low) } else { (&self.low, &self.high) };

        match first_bound {
            Bound::Unbounded => {
                if self.reverse {
                    cursor.last().await?;
                } else {
                    cursor.first().await?;
                }
            }
            Bound::Inclusive(key) | Bound::Exclusive(key) => {
                if self.reverse {
                    cursor.find_before(key).await?;
                    if matches!(first_bound, Bound::Exclusive(_)) && cursor.key() == Some(key.as_slice()) {
                        cursor.prev().await?;
                    }
                } else {
                    cursor.find(key).await?;
                    if matches!(first_bound, Bound::Exclusive(_)) && cursor.key() == Some(key.as_slice()) {
                        cursor.next().await?;
                    }
                }
            }
        }
        let _ = second_bound;

        self.primed.set(cursor.key().is_some());
        Ok(cursor)
    }

    fn past_high(&self, key: &[u8]) -> bool {
        match &self.high {
            Bound::Unbounded => false,
            Bound::Inclusive(b) => key > b.as_slice(),
            Bound::Exclusive(b) => key >= b.as_slice(),
        }
    }

    fn before_low(&self, key: &[u8]) -> bool {
        match &self.low {
            Bound::Unbounded => false,
            Bound::Inclusive(b) => key < b.as_slice(),
            Bound::Exclusive(b) => key <= b.as_slice(),
        }
    }

    /// Drives one cursor to the next row that passes `self.evaluator`,
    /// returning `None` once the range (and any chained range) is
    /// exhausted. `ScanStopped` from the evaluator is treated the same as
    /// exhaustion: the scan ends without advancing further.
    pub async fn advance(&self, cursor: &mut I::Cursor, args: &[Value]) -> Result<bool> {
        let mut primed = self.primed.replace(false);
        loop {
            if primed {
                primed = false;
            } else {
                let has_more = if self.reverse { cursor.prev().await? } else { cursor.next().await? };
                if !has_more {
                    return Ok(false);
                }
            }
            let Some(key) = cursor.key() else { return Ok(false) };
            if self.reverse {
                if self.before_low(key) {
                    return Ok(false);
                }
            } else if self.past_high(key) {
                return Ok(false);
            }

            cursor.autoload().await?;
            let value = cursor.value().unwrap_or(&[]);
            match self.evaluator.evaluate(key, value, args)? {
                Verdict::Pass => return Ok(true),
                Verdict::Fail => continue,
                Verdict::Stopped => {
                    cursor.reset();
                    return Ok(false);
                }
            }
        }
    }

    pub fn next_range(&self) -> Option<&ScanController<'a, I>> {
        self.next.as_deref()
    }
}
