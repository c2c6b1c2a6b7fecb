use relstore_codec::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOperator {
    pub fn is_exact(&self) -> bool {
        matches!(self, ComparisonOperator::Eq | ComparisonOperator::Ne)
    }

    /// Rank used to order terms within a classification bucket (§4.3).
    pub fn rank(&self) -> u8 {
        match self {
            ComparisonOperator::Eq => 0,
            ComparisonOperator::Ge => 1,
            ComparisonOperator::Gt => 2,
            ComparisonOperator::Le => 3,
            ComparisonOperator::Lt => 4,
            ComparisonOperator::Ne => 5,
        }
    }
}

/// The right-hand side of a `ColumnToArg` term: either a literal baked
/// into the query string or a `?N` placeholder resolved at bind time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Literal(Value),
    Placeholder(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    ColumnToArg { col: String, op: ComparisonOperator, arg: Arg },
    ColumnToColumn { col_a: String, op: ComparisonOperator, col_b: String },
    InFilter { col: String, args: Vec<Arg>, negate: bool },
    True,
    False,
}

impl Predicate {
    pub fn and(terms: Vec<Predicate>) -> Predicate {
        match terms.len() {
            0 => Predicate::True,
            1 => terms.into_iter().next().unwrap(),
            _ => Predicate::And(terms),
        }
    }

    pub fn or(terms: Vec<Predicate>) -> Predicate {
        match terms.len() {
            0 => Predicate::False,
            1 => terms.into_iter().next().unwrap(),
            _ => Predicate::Or(terms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrderClause {
    Default,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub column: String,
    pub descending: bool,
    pub nulls: NullsOrderClause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub projection: Projection,
    pub filter: Predicate,
    pub order_by: Vec<OrderTerm>,
}
