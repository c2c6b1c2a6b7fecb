//! Ordering reduction: once the selected index pins a column to a single
//! value (an equality term) or satisfies a prefix of the requested order
//! natively, that portion of `ORDER BY` needs no separate sort step.

use crate::index_spec::IndexSpec;
use relstore_query::ast::OrderTerm;
use relstore_query::filter::{ClassifiedTerm, TermClass};

/// Returns the suffix of `order_by` that the index does not already satisfy,
/// either because the column is pinned by an equality predicate (so every
/// row in the scan has the same value there, any order is fine) or because
/// the index's key naturally produces that order.
pub fn reduce_order_by(order_by: &[OrderTerm], index: &IndexSpec, terms: &[ClassifiedTerm]) -> Vec<OrderTerm> {
    let pinned: Vec<&str> = terms
        .iter()
        .filter(|t| t.class == TermClass::Equality)
        .map(|t| t.col.as_str())
        .collect();

    let mut remaining: Vec<OrderTerm> = order_by.iter().filter(|ot| !pinned.contains(&ot.column.as_str())).cloned().collect();

    // Drop a leading run of order-by columns the index's key already
    // produces in that order (direction-agnostic: a reverse scan flips it).
    let mut key_cols = index.key_columns.iter();
    while let Some(ot) = remaining.first() {
        match key_cols.next() {
            Some(kc) if kc.name == ot.column => {
                remaining.remove(0);
            }
            _ => break,
        }
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_spec::IndexKeyColumn;
    use relstore_codec::Direction;
    use relstore_query::ast::NullsOrderClause;

    fn ot(col: &str) -> OrderTerm {
        OrderTerm { column: col.to_string(), descending: false, nulls: NullsOrderClause::Default }
    }

    #[test]
    fn equality_pinned_column_is_dropped_from_order_by() {
        let idx = IndexSpec {
            name: "ab".into(),
            key_columns: vec![
                IndexKeyColumn { name: "a".into(), direction: Direction::Asc },
                IndexKeyColumn { name: "b".into(), direction: Direction::Asc },
            ],
            covering_columns: vec![],
            is_primary: false,
            is_unique: false,
        };
        let terms = vec![ClassifiedTerm {
            col: "a".into(),
            class: TermClass::Equality,
            lower: None,
            upper: None,
            raw: relstore_query::ast::Predicate::True,
        }];
        let reduced = reduce_order_by(&[ot("a"), ot("b")], &idx, &terms);
        assert!(reduced.is_empty());
    }
}
