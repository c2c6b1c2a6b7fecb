//! `RowEvaluator`: the decode/evaluate state machine of §4.4.
//!
//! Unlike [`relstore_query::filter::evaluate`] (the pure reference
//! interpreter used to check property 6), this walker owns a mutable,
//! lazily-populated column cache and understands two things the pure
//! interpreter doesn't: the leftmost-path caching rule for `And`/`Or`
//! branches, and the stop-column short circuit.

use crate::error::{EngineError, Result};
use crate::located::{LocatedColumns, Side};
use crate::row::RowInfo;
use relstore_query::ast::{Arg, ComparisonOperator, Predicate};
use relstore_query::filter::{compare_values, resolve_arg, values_equal};
use relstore_codec::Value;

/// Identifies the column and placeholder argument whose comparison, when
/// it first fails, ends the scan (§4.4). Used for open-range scans where
/// every subsequent key is known not to match either.
#[derive(Debug, Clone, PartialEq)]
pub struct StopColumn {
    pub column: String,
    pub arg_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The stop-column comparison failed; the scan controller should end
    /// the scan rather than advance the cursor.
    Stopped,
}

pub struct RowEvaluator<'a> {
    pub row_info: &'a RowInfo,
    pub residual: &'a Predicate,
    pub stop_column: Option<StopColumn>,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(row_info: &'a RowInfo, residual: &'a Predicate, stop_column: Option<StopColumn>) -> Self {
        RowEvaluator { row_info, residual, stop_column }
    }

    pub fn with_stop_column(mut self, stop_column: StopColumn) -> Self {
        self.stop_column = Some(stop_column);
        self
    }

    pub fn evaluate(&self, key_buf: &[u8], value_buf: &[u8], args: &[Value]) -> Result<Verdict> {
        let mut ctx = EvalCtx {
            key: LocatedColumns::new(key_buf, &self.row_info.key_columns, Side::Key),
            value: LocatedColumns::new(value_buf, &self.row_info.value_columns, Side::Value),
            row_info: self.row_info,
            stop_column: self.stop_column.as_ref(),
            args,
        };
        match ctx.eval(self.residual)? {
            Outcome::Known(true) => Ok(Verdict::Pass),
            Outcome::Known(false) => Ok(Verdict::Fail),
            // SQL's three-valued logic treats an unresolved (NULL-touching)
            // comparison as not matching a WHERE clause.
            Outcome::Unknown => Ok(Verdict::Fail),
            Outcome::Stopped => Ok(Verdict::Stopped),
        }
    }
}

enum Outcome {
    Known(bool),
    Unknown,
    Stopped,
}

struct EvalCtx<'a> {
    key: LocatedColumns<'a>,
    value: LocatedColumns<'a>,
    row_info: &'a RowInfo,
    stop_column: Option<&'a StopColumn>,
    args: &'a [Value],
}

impl<'a> EvalCtx<'a> {
    fn column_value(&mut self, name: &str) -> Result<Option<&Value>> {
        if let Some(idx) = self.key.index_of(name) {
            return Ok(Some(self.key.decode(idx)?));
        }
        if let Some(idx) = self.value.index_of(name) {
            return Ok(Some(self.value.decode(idx)?));
        }
        Ok(None)
    }

    fn eval(&mut self, pred: &Predicate) -> Result<Outcome> {
        match pred {
            Predicate::True => Ok(Outcome::Known(true)),
            Predicate::False => Ok(Outcome::Known(false)),
            Predicate::Not(inner) => Ok(match self.eval(inner)? {
                Outcome::Known(b) => Outcome::Known(!b),
                other => other,
            }),
            Predicate::And(terms) => self.eval_and(terms),
            Predicate::Or(terms) => self.eval_or(terms),
            Predicate::ColumnToArg { col, op, arg } => self.eval_column_to_arg(col, *op, arg),
            Predicate::ColumnToColumn { col_a, op, col_b } => {
                let lhs = self.column_value(col_a)?.cloned();
                let rhs = self.column_value(col_b)?.cloned();
                Ok(verdict_from(compare_values(lhs.as_ref(), rhs.as_ref(), *op).map_err(EngineError::from)?))
            }
            Predicate::InFilter { col, args, negate } => {
                let lhs = self.column_value(col)?.cloned();
                let Some(lhs) = lhs else { return Ok(Outcome::Unknown) };
                if lhs.is_null() {
                    return Ok(Outcome::Unknown);
                }
                let mut found = false;
                let mut saw_unknown = false;
                for a in args {
                    let rhs = resolve_arg(a, self.args).map_err(EngineError::from)?;
                    if rhs.is_null() {
                        saw_unknown = true;
                        continue;
                    }
                    if values_equal(&lhs, rhs).map_err(EngineError::from)? {
                        found = true;
                        break;
                    }
                }
                Ok(if found {
                    Outcome::Known(!*negate)
                } else if saw_unknown {
                    Outcome::Unknown
                } else {
                    Outcome::Known(*negate)
                })
            }
        }
    }

    /// Leftmost-path rule (§4.4): each sub-filter is tried in order with a
    /// fresh snapshot restore point; if the whole group short-circuits on
    /// a `false`, state discovered while evaluating the *other* branches
    /// (which are not guaranteed to have all run) is rolled back, keeping
    /// only what the leftmost surviving path located.
    fn eval_and(&mut self, terms: &[Predicate]) -> Result<Outcome> {
        let key_snapshot = self.key.snapshot();
        let value_snapshot = self.value.snapshot();
        let mut saw_unknown = false;
        for (i, t) in terms.iter().enumerate() {
            match self.eval(t)? {
                Outcome::Known(false) => {
                    if i > 0 {
                        self.key.restore(key_snapshot);
                        self.value.restore(value_snapshot);
                    }
                    return Ok(Outcome::Known(false));
                }
                Outcome::Known(true) => {}
                Outcome::Unknown => saw_unknown = true,
                Outcome::Stopped => return Ok(Outcome::Stopped),
            }
        }
        Ok(if saw_unknown { Outcome::Unknown } else { Outcome::Known(true) })
    }

    fn eval_or(&mut self, terms: &[Predicate]) -> Result<Outcome> {
        let key_snapshot = self.key.snapshot();
        let value_snapshot = self.value.snapshot();
        let mut saw_unknown = false;
        for (i, t) in terms.iter().enumerate() {
            match self.eval(t)? {
                Outcome::Known(true) => {
                    if i > 0 {
                        self.key.restore(key_snapshot);
                        self.value.restore(value_snapshot);
                    }
                    return Ok(Outcome::Known(true));
                }
                Outcome::Known(false) => {}
                Outcome::Unknown => saw_unknown = true,
                Outcome::Stopped => return Ok(Outcome::Stopped),
            }
        }
        Ok(if saw_unknown { Outcome::Unknown } else { Outcome::Known(false) })
    }

    fn eval_column_to_arg(&mut self, col: &str, op: ComparisonOperator, arg: &Arg) -> Result<Outcome> {
        let rhs = resolve_arg(arg, self.args).map_err(EngineError::from)?.clone();
        let lhs = self.column_value(col)?.cloned();
        let verdict = compare_values(lhs.as_ref(), Some(&rhs), op).map_err(EngineError::from)?;

        if let Some(stop) = self.stop_column {
            if stop.column == col {
                if let Arg::Placeholder(n) = arg {
                    if *n == stop.arg_index && verdict == Some(false) {
                        return Ok(Outcome::Stopped);
                    }
                }
            }
        }
        Ok(verdict_from(verdict))
    }
}

fn verdict_from(v: Option<bool>) -> Outcome {
    match v {
        Some(b) => Outcome::Known(b),
        None => Outcome::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowInfo;
    use relstore_codec::{lex, plain, ColumnDescriptor, ColumnType, Direction, NullsOrder};
    use relstore_query::ast::{ComparisonOperator as Op, Predicate};

    fn row_info() -> RowInfo {
        RowInfo {
            row_type: "t".into(),
            version: 1,
            key_columns: vec![ColumnDescriptor::key("a", ColumnType::I32, Direction::Asc, NullsOrder::Low, 0)],
            value_columns: vec![ColumnDescriptor::value("b", ColumnType::Utf8, false, 0)],
        }
    }

    fn encode_key(a: i32) -> Vec<u8> {
        let mut out = Vec::new();
        lex::encode(&Value::I32(a), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut out).unwrap();
        out
    }

    fn encode_value(b: &str) -> Vec<u8> {
        let mut out = Vec::new();
        plain::encode(&Value::Utf8(b.to_string()), &ColumnType::Utf8, false, &mut out).unwrap();
        out
    }

    #[test]
    fn and_short_circuits_and_passes() {
        let ri = row_info();
        let pred = Predicate::And(vec![
            Predicate::ColumnToArg { col: "a".into(), op: Op::Eq, arg: Arg::Placeholder(1) },
            Predicate::ColumnToArg { col: "b".into(), op: Op::Eq, arg: Arg::Placeholder(2) },
        ]);
        let evaluator = RowEvaluator::new(&ri, &pred, None);
        let args = vec![Value::I32(5), Value::Utf8("hi".into())];
        let key = encode_key(5);
        let value = encode_value("hi");
        assert_eq!(evaluator.evaluate(&key, &value, &args).unwrap(), Verdict::Pass);
    }

    #[test]
    fn and_fails_without_decoding_second_branch_needlessly() {
        let ri = row_info();
        let pred = Predicate::And(vec![
            Predicate::ColumnToArg { col: "a".into(), op: Op::Eq, arg: Arg::Placeholder(1) },
            Predicate::ColumnToArg { col: "b".into(), op: Op::Eq, arg: Arg::Placeholder(2) },
        ]);
        let evaluator = RowEvaluator::new(&ri, &pred, None);
        let args = vec![Value::I32(99), Value::Utf8("hi".into())];
        let key = encode_key(5);
        let value = encode_value("hi");
        assert_eq!(evaluator.evaluate(&key, &value, &args).unwrap(), Verdict::Fail);
    }

    #[test]
    fn stop_column_ends_scan_on_first_failure() {
        let ri = row_info();
        let pred = Predicate::ColumnToArg { col: "a".into(), op: Op::Lt, arg: Arg::Placeholder(1) };
        let stop = StopColumn { column: "a".into(), arg_index: 1 };
        let evaluator = RowEvaluator::new(&ri, &pred, Some(stop));
        let args = vec![Value::I32(3)];
        let key = encode_key(5);
        let value = encode_value("hi");
        assert_eq!(evaluator.evaluate(&key, &value, &args).unwrap(), Verdict::Stopped);
    }
}
