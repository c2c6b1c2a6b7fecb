//! Turns a normalized filter into one or more scan plans (§4, §5).

use crate::index_spec::IndexSpec;
use crate::ordering::reduce_order_by;
use crate::scoring::best_index;
use relstore_query::ast::{Arg, OrderTerm, Predicate};
use relstore_query::filter::{classify_group, dnf, ClassifiedTerm};

/// One bound of a range scan: the classified term's lower/upper, carried
/// through so the engine's scan controller (C5) can build start/end keys
/// without re-deriving them from the raw predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBound {
    pub col: String,
    pub lower: Option<(relstore_query::ast::ComparisonOperator, Arg)>,
    pub upper: Option<(relstore_query::ast::ComparisonOperator, Arg)>,
}

/// A single scan against one index, covering one disjunctive group of the
/// normalized filter. The engine may need to run several of these and
/// union the results (when the filter didn't collapse to one group) or
/// subtract a previous group's key range (when two groups pick different
/// indexes and would otherwise double-count rows matching both).
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub index: IndexSpec,
    pub bounds: Vec<ScanBound>,
    /// Terms that survive the index's key-match prefix and must be
    /// re-evaluated by the filter interpreter (C4) against each decoded row.
    pub residual: Predicate,
    /// `ORDER BY` terms left over after the index's natural order and any
    /// equality-pinned columns are accounted for; non-empty means the
    /// engine must sort after scanning.
    pub remaining_order_by: Vec<OrderTerm>,
    /// `AND NOT` exclusions against earlier groups' chosen indexes,
    /// applied when a later group shares rows with an earlier one picked
    /// on a different index (progressive subtraction, §4.4).
    pub exclude: Vec<Plan>,
}

pub struct Planner<'a> {
    pub primary: &'a IndexSpec,
    pub candidates: &'a [IndexSpec],
}

impl<'a> Planner<'a> {
    pub fn new(primary: &'a IndexSpec, candidates: &'a [IndexSpec]) -> Self {
        Planner { primary, candidates }
    }

    /// Builds one `Plan` per disjunctive group of the filter, selecting
    /// the best-scoring index for each group independently. Groups after
    /// the first subtract the key ranges of earlier groups that landed on
    /// a *different* index, so the union of plans doesn't double-scan
    /// rows matching more than one disjunct.
    pub fn plan(&self, filter: &Predicate, projection: &[String], order_by: &[OrderTerm], for_update: bool) -> Vec<Plan> {
        let normalized = dnf(filter);
        let groups = flatten_dnf(&normalized);

        let mut all_candidates: Vec<IndexSpec> = self.candidates.to_vec();
        if !all_candidates.iter().any(|c| c.is_primary) {
            all_candidates.push(self.primary.clone());
        }

        // Writers that intend to update the row they scan must latch it
        // through the primary, since secondary-index entries are derived
        // and not safe to hold a lock on across the trigger rewrite.
        let usable: Vec<IndexSpec> = if for_update {
            vec![self.primary.clone()]
        } else {
            all_candidates
        };

        let mut plans: Vec<Plan> = Vec::new();
        for group in &groups {
            let (classified, extra) = classify_group(group);
            let (chosen, _score) = match best_index(&usable, &classified, &extra, group, self.primary, projection, order_by) {
                Some(v) => v,
                None => continue,
            };

            let bounds = bounds_for(&classified, chosen);
            let residual = residual_predicate(&classified, &extra, chosen);
            let remaining_order_by = reduce_order_by(order_by, chosen, &classified);

            let exclude: Vec<Plan> = plans.iter().filter(|p| p.index.name != chosen.name).cloned().collect();

            plans.push(Plan {
                index: chosen.clone(),
                bounds,
                residual,
                remaining_order_by,
                exclude,
            });
        }
        plans
    }
}

/// Pulls the leaf conjunctive groups out of a `dnf`-normalized predicate.
fn flatten_dnf(pred: &Predicate) -> Vec<Vec<Predicate>> {
    match pred {
        Predicate::Or(groups) => groups.iter().map(flatten_one).collect(),
        other => vec![flatten_one(other)],
    }
}

fn flatten_one(pred: &Predicate) -> Vec<Predicate> {
    match pred {
        Predicate::And(terms) => terms.clone(),
        Predicate::True => vec![],
        other => vec![other.clone()],
    }
}

fn bounds_for(classified: &[ClassifiedTerm], index: &IndexSpec) -> Vec<ScanBound> {
    let mut consumed = 0usize;
    let mut bounds = Vec::new();
    for kc in &index.key_columns {
        let Some(term) = classified.iter().find(|t| t.col == kc.name) else { break };
        bounds.push(ScanBound { col: term.col.clone(), lower: term.lower.clone(), upper: term.upper.clone() });
        consumed += 1;
        if !matches!(term.class, relstore_query::filter::TermClass::Equality) {
            break;
        }
    }
    let _ = consumed;
    bounds
}

fn residual_predicate(classified: &[ClassifiedTerm], extra: &[Predicate], index: &IndexSpec) -> Predicate {
    let consumed_cols: std::collections::HashSet<&str> = {
        let mut set = std::collections::HashSet::new();
        for kc in &index.key_columns {
            match classified.iter().find(|t| t.col == kc.name) {
                Some(t) => {
                    set.insert(t.col.as_str());
                    if !matches!(t.class, relstore_query::filter::TermClass::Equality) {
                        break;
                    }
                }
                None => break,
            }
        }
        set
    };

    let mut leftover: Vec<Predicate> = classified.iter().filter(|t| !consumed_cols.contains(t.col.as_str())).map(|t| t.raw.clone()).collect();
    leftover.extend(extra.iter().cloned());
    Predicate::and(leftover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_spec::IndexKeyColumn;
    use relstore_codec::Direction;
    use relstore_query::parser::parse;

    fn idx(name: &str, cols: &[&str], is_primary: bool) -> IndexSpec {
        IndexSpec {
            name: name.to_string(),
            key_columns: cols.iter().map(|c| IndexKeyColumn { name: c.to_string(), direction: Direction::Asc }).collect(),
            covering_columns: vec![],
            is_primary,
            is_unique: is_primary,
        }
    }

    #[test]
    fn single_group_picks_best_index_and_leaves_residual() {
        let primary = idx("primary", &["id"], true);
        let ab = idx("ab", &["a", "b"], false);
        let ac = idx("ac", &["a", "c"], false);
        let planner = Planner::new(&primary, &[ab, ac]);

        let q = parse("a == ?1 && b > ?2 && c < ?3").unwrap();
        let plans = planner.plan(&q.filter, &[], &[], false);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].index.name, "ab");
        assert_eq!(plans[0].bounds.len(), 2);
    }

    #[test]
    fn for_update_forces_primary() {
        let primary = idx("primary", &["id"], true);
        let ab = idx("ab", &["a", "b"], false);
        let planner = Planner::new(&primary, &[ab]);

        let q = parse("a == ?1").unwrap();
        let plans = planner.plan(&q.filter, &[], &[], true);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].index.name, "primary");
    }

    #[test]
    fn disjunction_produces_one_plan_per_group() {
        let primary = idx("primary", &["id"], true);
        let ab = idx("ab", &["a"], false);
        let cd = idx("cd", &["c"], false);
        let planner = Planner::new(&primary, &[ab, cd]);

        let q = parse("a == ?1 || c == ?2").unwrap();
        let plans = planner.plan(&q.filter, &[], &[], false);
        assert_eq!(plans.len(), 2);
    }
}
