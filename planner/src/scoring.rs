//! Per-group index scoring (§4.3).

use crate::index_spec::IndexSpec;
use relstore_query::ast::Predicate;
use relstore_query::filter::{ClassifiedTerm, TermClass};
use relstore_query::ast::OrderTerm;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexScore {
    pub key_match: i32,
    pub covering: bool,
    pub availability: usize,
    pub natural_order: bool,
    pub preference: bool,
    /// Smaller is better; negated so `Ord` keeps "bigger score wins".
    pub size_penalty: i32,
}

impl PartialOrd for IndexScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_match
            .cmp(&other.key_match)
            .then_with(|| self.covering.cmp(&other.covering))
            .then_with(|| self.availability.cmp(&other.availability))
            .then_with(|| self.natural_order.cmp(&other.natural_order))
            .then_with(|| self.preference.cmp(&other.preference))
            .then_with(|| other.size_penalty.cmp(&self.size_penalty))
    }
}

fn key_match_score(terms: &[ClassifiedTerm], index: &IndexSpec, primary: &IndexSpec, projection: &[String], order_by: &[OrderTerm]) -> i32 {
    let mut score = 0;
    let mut first = true;
    for kc in &index.key_columns {
        let Some(term) = terms.iter().find(|t| t.col == kc.name) else { break };
        let points = match term.class {
            TermClass::Equality => 3,
            TermClass::FullRange => 2,
            TermClass::HalfRange => {
                // A term with a `lower` bound came from a genuine `>`/`>=`
                // with no matching upper; one with only an `upper` is a
                // bare `<`/`<=` candidate that `classify_group` promoted
                // to `HalfRange` for lack of a partner (spec.md §4.3:
                // "remaining candidates are converted to HALF_RANGE"). It
                // narrows the scan less usefully than a real half-range
                // and must not outscore one, so it never earns a point.
                let genuine = term.lower.is_some();
                let covering = index.is_covering(projection.iter());
                let is_first_order_col = order_by.first().map(|o| o.column == kc.name).unwrap_or(false);
                if genuine && (!first || covering || is_first_order_col) {
                    1
                } else {
                    0
                }
            }
            TermClass::Remainder => 0,
        };
        if points == 0 {
            break;
        }
        score += points;
        first = false;
    }

    if !index.is_primary {
        let all_pk_eq = primary
            .key_columns
            .iter()
            .all(|pkc| terms.iter().any(|t| t.col == pkc.name && t.class == TermClass::Equality));
        if all_pk_eq {
            return key_match_score(terms, primary, primary, projection, order_by);
        }
    }
    score
}

fn natural_order_match(index: &IndexSpec, order_by: &[OrderTerm]) -> bool {
    if order_by.is_empty() {
        return false;
    }
    index
        .key_columns
        .iter()
        .zip(order_by.iter())
        .all(|(kc, ot)| kc.name == ot.column)
}

fn preference_match(index: &IndexSpec, original_group: &[Predicate]) -> bool {
    let Some(first_col) = index.key_columns.first().map(|c| c.name.as_str()) else { return false };
    for term in original_group {
        if let Some(col) = term_column(term) {
            return col == first_col;
        }
    }
    false
}

fn term_column(term: &Predicate) -> Option<&str> {
    match term {
        Predicate::ColumnToArg { col, .. } => Some(col),
        Predicate::ColumnToColumn { col_a, .. } => Some(col_a),
        Predicate::InFilter { col, .. } => Some(col),
        _ => None,
    }
}

pub fn score_index(
    terms: &[ClassifiedTerm],
    extra: &[Predicate],
    original_group: &[Predicate],
    index: &IndexSpec,
    primary: &IndexSpec,
    projection: &[String],
    order_by: &[OrderTerm],
) -> IndexScore {
    let filtered_cols: HashSet<&str> = terms
        .iter()
        .map(|t| t.col.as_str())
        .chain(extra.iter().filter_map(|p| term_column(p)))
        .collect();

    let mut covering_cols: Vec<String> = projection.to_vec();
    covering_cols.extend(filtered_cols.iter().map(|s| s.to_string()));
    let covering = index.is_covering(covering_cols.iter());

    let availability = filtered_cols.iter().filter(|c| index.covers(c)).count();

    IndexScore {
        key_match: key_match_score(terms, index, primary, projection, order_by),
        covering,
        availability,
        natural_order: natural_order_match(index, order_by),
        preference: preference_match(index, original_group),
        size_penalty: index.key_columns.len() as i32,
    }
}

pub fn best_index<'a>(
    candidates: &'a [IndexSpec],
    terms: &[ClassifiedTerm],
    extra: &[Predicate],
    original_group: &[Predicate],
    primary: &IndexSpec,
    projection: &[String],
    order_by: &[OrderTerm],
) -> Option<(&'a IndexSpec, IndexScore)> {
    candidates
        .iter()
        .map(|idx| (idx, score_index(terms, extra, original_group, idx, primary, projection, order_by)))
        .max_by(|(_, a), (_, b)| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore_codec::Direction;
    use crate::index_spec::IndexKeyColumn;
    use relstore_query::filter::{classify_group, dnf};
    use relstore_query::parser::parse;

    fn idx(name: &str, cols: &[&str]) -> IndexSpec {
        IndexSpec {
            name: name.to_string(),
            key_columns: cols
                .iter()
                .map(|c| IndexKeyColumn { name: c.to_string(), direction: Direction::Asc })
                .collect(),
            covering_columns: vec![],
            is_primary: name == "primary",
            is_unique: false,
        }
    }

    #[test]
    fn scenario_d_prefers_ab_over_ac() {
        let q = parse("a == ?1 && b > ?2 && c < ?3").unwrap();
        let normalized = dnf(&q.filter);
        let group = match normalized {
            relstore_query::ast::Predicate::And(terms) => terms,
            relstore_query::ast::Predicate::ColumnToArg { .. } => vec![normalized.clone()],
            other => vec![other],
        };
        let (classified, extra) = classify_group(&group);

        let primary = idx("primary", &["id"]);
        let ab = idx("ab", &["a", "b"]);
        let ac = idx("ac", &["a", "c"]);
        let candidates = [ab.clone(), ac.clone()];

        let (best, _) = best_index(&candidates, &classified, &extra, &group, &primary, &[], &[]).unwrap();
        assert_eq!(best.name, "ab");
    }
}
