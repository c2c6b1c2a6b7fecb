//! Pure interpreter for a [`Predicate`] tree (§4.4's reference semantics,
//! used by testable property 6 to check the lazy evaluator's verdict) plus
//! DNF normalization and term classification (§4.3), which the planner
//! crate consumes to score indexes.

use crate::ast::{Arg, ComparisonOperator, Predicate};
use crate::error::{QueryError, Result};
use relstore_codec::Value;
use std::cmp::Ordering;

/// Something that can answer "what is the value of column `name`". Kept
/// generic so both the engine's lazily-decoded row and a plain in-memory
/// map can serve as a reference implementation for property 6.
pub trait Row {
    fn get(&self, column: &str) -> Option<&Value>;
}

pub fn resolve_arg<'a>(arg: &'a Arg, args: &'a [Value]) -> Result<&'a Value> {
    match arg {
        Arg::Literal(v) => Ok(v),
        Arg::Placeholder(n) => args.get(n.checked_sub(1).unwrap_or(usize::MAX)).ok_or(QueryError::UnboundPlaceholder(*n)),
    }
}

/// `None` models SQL three-valued logic: a comparison against a `Null`
/// value (other than via an explicit null-check, which this grammar does
/// not expose) is neither true nor false.
pub fn evaluate<R: Row>(pred: &Predicate, row: &R, args: &[Value]) -> Result<Option<bool>> {
    match pred {
        Predicate::True => Ok(Some(true)),
        Predicate::False => Ok(Some(false)),
        Predicate::Not(inner) => Ok(evaluate(inner, row, args)?.map(|b| !b)),
        Predicate::And(terms) => {
            let mut saw_unknown = false;
            for t in terms {
                match evaluate(t, row, args)? {
                    Some(false) => return Ok(Some(false)),
                    Some(true) => {}
                    None => saw_unknown = true,
                }
            }
            Ok(if saw_unknown { None } else { Some(true) })
        }
        Predicate::Or(terms) => {
            let mut saw_unknown = false;
            for t in terms {
                match evaluate(t, row, args)? {
                    Some(true) => return Ok(Some(true)),
                    Some(false) => {}
                    None => saw_unknown = true,
                }
            }
            Ok(if saw_unknown { None } else { Some(false) })
        }
        Predicate::ColumnToArg { col, op, arg } => {
            let lhs = row.get(col);
            let rhs = resolve_arg(arg, args)?;
            compare_values(lhs, Some(rhs), *op)
        }
        Predicate::ColumnToColumn { col_a, op, col_b } => {
            let lhs = row.get(col_a);
            let rhs = row.get(col_b);
            compare_values(lhs, rhs, *op)
        }
        Predicate::InFilter { col, args: list, negate } => {
            let lhs = row.get(col);
            let Some(lhs) = lhs else { return Ok(None) };
            let mut any_unknown = false;
            for a in list {
                let rhs = resolve_arg(a, args)?;
                if rhs.is_null() {
                    any_unknown = true;
                    continue;
                }
                if values_equal(lhs, rhs)? {
                    return Ok(Some(!negate));
                }
            }
            if any_unknown {
                Ok(None)
            } else {
                Ok(Some(*negate))
            }
        }
    }
}

pub fn compare_values(lhs: Option<&Value>, rhs: Option<&Value>, op: ComparisonOperator) -> Result<Option<bool>> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else { return Ok(None) };
    if lhs.is_null() || rhs.is_null() {
        return Ok(None);
    }
    if !op.is_exact() && common_numeric_kind(lhs) != common_numeric_kind(rhs) {
        return Err(QueryError::AmbiguousComparison);
    }
    let ord = compare_ordered(lhs, rhs)?;
    Ok(Some(match op {
        ComparisonOperator::Eq => ord == Ordering::Equal,
        ComparisonOperator::Ne => ord != Ordering::Equal,
        ComparisonOperator::Lt => ord == Ordering::Less,
        ComparisonOperator::Le => ord != Ordering::Greater,
        ComparisonOperator::Gt => ord == Ordering::Greater,
        ComparisonOperator::Ge => ord != Ordering::Less,
    }))
}

pub fn values_equal(a: &Value, b: &Value) -> Result<bool> {
    Ok(compare_ordered(a, b)? == Ordering::Equal)
}

#[derive(PartialEq)]
enum Kind {
    Numeric,
    Text,
    Other,
}

fn common_numeric_kind(v: &Value) -> Kind {
    match v {
        Value::U8(_) | Value::I8(_) | Value::U16(_) | Value::I16(_) | Value::U32(_) | Value::I32(_) | Value::U64(_)
        | Value::I64(_) | Value::F32(_) | Value::F64(_) | Value::BigInt(_) | Value::BigDecimal(_) => Kind::Numeric,
        Value::Utf8(_) | Value::Char(_) => Kind::Text,
        _ => Kind::Other,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    Some(match v {
        Value::U8(n) => *n as f64,
        Value::I8(n) => *n as f64,
        Value::U16(n) => *n as f64,
        Value::I16(n) => *n as f64,
        Value::U32(n) => *n as f64,
        Value::I32(n) => *n as f64,
        Value::U64(n) => *n as f64,
        Value::I64(n) => *n as f64,
        Value::F32(n) => *n as f64,
        Value::F64(n) => *n,
        _ => return None,
    })
}

fn compare_ordered(a: &Value, b: &Value) -> Result<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y).ok_or(QueryError::AmbiguousComparison);
    }
    match (a, b) {
        (Value::Utf8(x), Value::Utf8(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Ok(x.cmp(y)),
        _ => Err(QueryError::AmbiguousComparison),
    }
}

/// Classification of a `ColumnToArg` term within one conjunctive group,
/// per §4.3. Sorting by `(classification as u8, op.rank())` implements
/// "terms sort by (classification asc, operator rank)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TermClass {
    Equality = 0,
    FullRange = 1,
    HalfRange = 2,
    Remainder = 3,
}

/// A classified term inside one conjunctive group, after candidate/half-range
/// merging into full ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTerm {
    pub col: String,
    pub class: TermClass,
    pub lower: Option<(ComparisonOperator, Arg)>,
    pub upper: Option<(ComparisonOperator, Arg)>,
    pub raw: Predicate,
}

/// Walks one conjunctive group (a flat `Vec<Predicate>`, already `And`-free
/// at the top) and classifies each `ColumnToArg` term, merging a
/// `HALF_RANGE` (`>`, `>=`) with a `CANDIDATE` (`<`, `<=`) on the same
/// column into a single `FULL_RANGE`. Non-`ColumnToArg` terms (and terms
/// on columns that never get merged) pass through unclassified in `extra`.
pub fn classify_group(terms: &[Predicate]) -> (Vec<ClassifiedTerm>, Vec<Predicate>) {
    use std::collections::HashMap;

    let mut lowers: HashMap<String, (ComparisonOperator, Arg, Predicate)> = HashMap::new();
    let mut uppers: HashMap<String, (ComparisonOperator, Arg, Predicate)> = HashMap::new();
    let mut equalities: Vec<ClassifiedTerm> = Vec::new();
    let mut extra: Vec<Predicate> = Vec::new();

    for term in terms {
        match term {
            Predicate::ColumnToArg { col, op, arg } => match op {
                ComparisonOperator::Eq => equalities.push(ClassifiedTerm {
                    col: col.clone(),
                    class: TermClass::Equality,
                    lower: Some((*op, arg.clone())),
                    upper: None,
                    raw: term.clone(),
                }),
                ComparisonOperator::Gt | ComparisonOperator::Ge => {
                    lowers.insert(col.clone(), (*op, arg.clone(), term.clone()));
                }
                ComparisonOperator::Lt | ComparisonOperator::Le => {
                    uppers.insert(col.clone(), (*op, arg.clone(), term.clone()));
                }
                ComparisonOperator::Ne => extra.push(term.clone()),
            },
            other => extra.push(other.clone()),
        }
    }

    let mut out = equalities;
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for (col, (lop, larg, lraw)) in lowers.iter() {
        seen.insert(col.clone());
        if let Some((uop, uarg, _)) = uppers.get(col) {
            out.push(ClassifiedTerm {
                col: col.clone(),
                class: TermClass::FullRange,
                lower: Some((*lop, larg.clone())),
                upper: Some((*uop, uarg.clone())),
                raw: Predicate::And(vec![lraw.clone(), uppers[col].2.clone()]),
            });
        } else {
            out.push(ClassifiedTerm {
                col: col.clone(),
                class: TermClass::HalfRange,
                lower: Some((*lop, larg.clone())),
                upper: None,
                raw: lraw.clone(),
            });
        }
    }
    for (col, (uop, uarg, uraw)) in uppers.iter() {
        if seen.contains(col) {
            continue;
        }
        // A bare CANDIDATE (`<`/`<=`) with no matching half-range on the
        // same column is reclassified as a HALF_RANGE (§4.3: "Remaining
        // candidates are converted to HALF_RANGE").
        out.push(ClassifiedTerm {
            col: col.clone(),
            class: TermClass::HalfRange,
            lower: None,
            upper: Some((*uop, uarg.clone())),
            raw: uraw.clone(),
        });
    }

    out.sort_by(|a, b| {
        a.class
            .cmp(&b.class)
            .then_with(|| a.lower.as_ref().or(a.upper.as_ref()).map(|(op, _)| op.rank()).cmp(&b.lower.as_ref().or(b.upper.as_ref()).map(|(op, _)| op.rank())))
    });
    (out, extra)
}

/// Rewrites a predicate tree into an `Or` of conjunctive groups (DNF),
/// pushing `Not` down to the leaves first (De Morgan) and then
/// distributing `And` over `Or`.
pub fn dnf(pred: &Predicate) -> Predicate {
    let pushed = push_not(pred, false);
    let groups = to_dnf_groups(&pushed);
    Predicate::or(groups.into_iter().map(Predicate::and).collect())
}

fn negate_op(op: ComparisonOperator) -> ComparisonOperator {
    match op {
        ComparisonOperator::Eq => ComparisonOperator::Ne,
        ComparisonOperator::Ne => ComparisonOperator::Eq,
        ComparisonOperator::Lt => ComparisonOperator::Ge,
        ComparisonOperator::Le => ComparisonOperator::Gt,
        ComparisonOperator::Gt => ComparisonOperator::Le,
        ComparisonOperator::Ge => ComparisonOperator::Lt,
    }
}

fn push_not(pred: &Predicate, negated: bool) -> Predicate {
    match pred {
        Predicate::True => if negated { Predicate::False } else { Predicate::True },
        Predicate::False => if negated { Predicate::True } else { Predicate::False },
        Predicate::Not(inner) => push_not(inner, !negated),
        Predicate::And(terms) => {
            let mapped = terms.iter().map(|t| push_not(t, negated));
            if negated {
                Predicate::or(mapped.collect())
            } else {
                Predicate::and(mapped.collect())
            }
        }
        Predicate::Or(terms) => {
            let mapped = terms.iter().map(|t| push_not(t, negated));
            if negated {
                Predicate::and(mapped.collect())
            } else {
                Predicate::or(mapped.collect())
            }
        }
        Predicate::ColumnToArg { col, op, arg } => Predicate::ColumnToArg {
            col: col.clone(),
            op: if negated { negate_op(*op) } else { *op },
            arg: arg.clone(),
        },
        Predicate::ColumnToColumn { col_a, op, col_b } => Predicate::ColumnToColumn {
            col_a: col_a.clone(),
            op: if negated { negate_op(*op) } else { *op },
            col_b: col_b.clone(),
        },
        Predicate::InFilter { col, args, negate } => Predicate::InFilter {
            col: col.clone(),
            args: args.clone(),
            negate: if negated { !*negate } else { *negate },
        },
    }
}

/// Distributes `And` over `Or`, assuming `Not` has already been pushed to
/// the leaves. Returns a list of conjunctive groups (each a flat term
/// list).
fn to_dnf_groups(pred: &Predicate) -> Vec<Vec<Predicate>> {
    match pred {
        Predicate::Or(terms) => terms.iter().flat_map(to_dnf_groups).collect(),
        Predicate::And(terms) => {
            let mut acc: Vec<Vec<Predicate>> = vec![Vec::new()];
            for t in terms {
                let sub_groups = to_dnf_groups(t);
                let mut next = Vec::with_capacity(acc.len() * sub_groups.len());
                for a in &acc {
                    for s in &sub_groups {
                        let mut combined = a.clone();
                        combined.extend(s.clone());
                        next.push(combined);
                    }
                }
                acc = next;
            }
            acc
        }
        leaf => vec![vec![leaf.clone()]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::collections::HashMap;

    struct MapRow(HashMap<String, Value>);
    impl Row for MapRow {
        fn get(&self, column: &str) -> Option<&Value> {
            self.0.get(column)
        }
    }

    #[test]
    fn classify_merges_half_range_and_candidate() {
        let q = parse("a == ?1 && b > ?2 && c < ?3").unwrap();
        let groups = to_dnf_groups(&push_not(&q.filter, false));
        assert_eq!(groups.len(), 1);
        let (classified, extra) = classify_group(&groups[0]);
        assert!(extra.is_empty());
        assert_eq!(classified.iter().find(|t| t.col == "a").unwrap().class, TermClass::Equality);
        assert_eq!(classified.iter().find(|t| t.col == "b").unwrap().class, TermClass::HalfRange);
        assert_eq!(classified.iter().find(|t| t.col == "c").unwrap().class, TermClass::HalfRange);
    }

    #[test]
    fn classify_merges_into_full_range() {
        let q = parse("a >= ?1 && a < ?2").unwrap();
        let groups = to_dnf_groups(&push_not(&q.filter, false));
        let (classified, _) = classify_group(&groups[0]);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].class, TermClass::FullRange);
    }

    #[test]
    fn dnf_distributes_and_over_or() {
        let q = parse("a == ?1 && (b == ?2 || c == ?3)").unwrap();
        let normalized = dnf(&q.filter);
        match normalized {
            Predicate::Or(groups) => assert_eq!(groups.len(), 2),
            other => panic!("expected Or of two groups, got {other:?}"),
        }
    }

    #[test]
    fn interpreter_matches_scenario_d_row() {
        let q = parse("a == ?1 && b > ?2 && c < ?3").unwrap();
        let args = vec![Value::I32(1), Value::I32(10), Value::I32(100)];
        let mut row = HashMap::new();
        row.insert("a".to_string(), Value::I32(1));
        row.insert("b".to_string(), Value::I32(20));
        row.insert("c".to_string(), Value::I32(5));
        assert_eq!(evaluate(&q.filter, &MapRow(row), &args).unwrap(), Some(true));
    }

    #[test]
    fn not_pushed_to_leaves_flips_operators() {
        let q = parse("!(a == ?1)").unwrap();
        let pushed = push_not(&q.filter, false);
        match pushed {
            Predicate::ColumnToArg { op, .. } => assert_eq!(op, ComparisonOperator::Ne),
            other => panic!("expected ColumnToArg, got {other:?}"),
        }
    }
}
