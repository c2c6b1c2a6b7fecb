use crate::ast::{Arg, ComparisonOperator, NullsOrderClause, OrderTerm, Predicate, Projection, Query};
use crate::error::{QueryError, Result};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use relstore_codec::Value;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct QueryGrammar;

pub fn parse(input: &str) -> Result<Query> {
    let mut pairs = QueryGrammar::parse(Rule::query, input).map_err(|e| QueryError::Parse(e.to_string()))?;
    let query_pair = pairs.next().ok_or_else(|| QueryError::Parse("empty query".into()))?;

    let mut projection = Projection::All;
    let mut filter = Predicate::True;
    let mut order_by = Vec::new();

    for pair in query_pair.into_inner() {
        match pair.as_rule() {
            Rule::projection => projection = parse_projection(pair),
            Rule::or_expr => filter = parse_or(pair)?,
            Rule::order_by => order_by = parse_order_by(pair),
            Rule::EOI => {}
            _ => {}
        }
    }

    Ok(Query { projection, filter, order_by })
}

fn parse_projection(pair: Pair<Rule>) -> Projection {
    let idents: Vec<String> = pair.into_inner().map(|p| p.as_str().to_string()).collect();
    if idents.is_empty() {
        Projection::All
    } else {
        Projection::Columns(idents)
    }
}

fn parse_order_by(pair: Pair<Rule>) -> Vec<OrderTerm> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::order_term)
        .map(|p| {
            let s = p.as_str();
            let descending = s.starts_with('-');
            let rest = &s[1..];
            let (nulls, column) = if let Some(stripped) = rest.strip_prefix('!') {
                (NullsOrderClause::Low, stripped.to_string())
            } else {
                (NullsOrderClause::Default, rest.to_string())
            };
            OrderTerm { column, descending, nulls }
        })
        .collect()
}

fn parse_or(pair: Pair<Rule>) -> Result<Predicate> {
    let terms: Result<Vec<Predicate>> = pair.into_inner().map(parse_and).collect();
    Ok(Predicate::or(terms?))
}

fn parse_and(pair: Pair<Rule>) -> Result<Predicate> {
    let terms: Result<Vec<Predicate>> = pair.into_inner().map(parse_unary).collect();
    Ok(Predicate::and(terms?))
}

fn parse_unary(pair: Pair<Rule>) -> Result<Predicate> {
    match pair.as_rule() {
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = inner.next().ok_or_else(|| QueryError::Parse("empty unary expr".into()))?;
            if first.as_rule() == Rule::unary_expr {
                Ok(Predicate::Not(Box::new(parse_unary(first)?)))
            } else {
                parse_primary(first)
            }
        }
        Rule::primary => parse_primary(pair),
        other => Err(QueryError::Parse(format!("unexpected rule in unary position: {other:?}"))),
    }
}

fn parse_primary(pair: Pair<Rule>) -> Result<Predicate> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| QueryError::Parse("empty primary".into()))?;
    match first.as_rule() {
        Rule::comparison => parse_comparison(first),
        Rule::or_expr => parse_or(first),
        other => Err(QueryError::Parse(format!("unexpected rule in primary position: {other:?}"))),
    }
}

enum Operand {
    Column(String),
    Arg(Arg),
}

fn parse_operand(pair: Pair<Rule>) -> Result<Operand> {
    let inner = pair.into_inner().next().ok_or_else(|| QueryError::Parse("empty operand".into()))?;
    match inner.as_rule() {
        Rule::placeholder => {
            let n: usize = inner.as_str()[1..].parse().map_err(|_| QueryError::Parse("bad placeholder".into()))?;
            Ok(Operand::Arg(Arg::Placeholder(n)))
        }
        Rule::literal => Ok(Operand::Arg(Arg::Literal(parse_literal(inner)?))),
        Rule::ident => Ok(Operand::Column(inner.as_str().to_string())),
        other => Err(QueryError::Parse(format!("unexpected operand rule: {other:?}"))),
    }
}

fn parse_literal(pair: Pair<Rule>) -> Result<Value> {
    let inner = pair.into_inner().next().ok_or_else(|| QueryError::Parse("empty literal".into()))?;
    match inner.as_rule() {
        Rule::string_lit => {
            let s = inner.as_str();
            Ok(Value::Utf8(s[1..s.len() - 1].to_string()))
        }
        Rule::float_lit => {
            let f: f64 = inner.as_str().parse().map_err(|_| QueryError::Parse("bad float literal".into()))?;
            Ok(Value::F64(f))
        }
        Rule::int_lit => {
            let i: i64 = inner.as_str().parse().map_err(|_| QueryError::Parse("bad int literal".into()))?;
            Ok(Value::I64(i))
        }
        Rule::bool_lit => Ok(Value::Bool(inner.as_str() == "true")),
        Rule::null_lit => Ok(Value::Null),
        other => Err(QueryError::Parse(format!("unexpected literal rule: {other:?}"))),
    }
}

fn parse_comparison(pair: Pair<Rule>) -> Result<Predicate> {
    let mut inner = pair.into_inner();
    let lhs_pair = inner.next().ok_or_else(|| QueryError::Parse("missing lhs".into()))?;
    let op_pair = inner.next().ok_or_else(|| QueryError::Parse("missing operator".into()))?;
    let rhs_list_pair = inner.next().ok_or_else(|| QueryError::Parse("missing rhs".into()))?;

    let lhs = parse_operand(lhs_pair)?;
    let op_str = op_pair.as_str();

    let rhs_operands: Result<Vec<Operand>> = rhs_list_pair.into_inner().map(parse_operand).collect();
    let rhs_operands = rhs_operands?;

    let col = match lhs {
        Operand::Column(c) => c,
        Operand::Arg(_) => return Err(QueryError::Parse("left-hand side of a comparison must be a column".into())),
    };

    if op_str == "in" || op_str == "not in" {
        let args: Result<Vec<Arg>> = rhs_operands
            .into_iter()
            .map(|o| match o {
                Operand::Arg(a) => Ok(a),
                Operand::Column(_) => Err(QueryError::Parse("`in` list elements must be literals or placeholders".into())),
            })
            .collect();
        return Ok(Predicate::InFilter { col, args: args?, negate: op_str == "not in" });
    }

    if rhs_operands.len() != 1 {
        return Err(QueryError::Parse("comparison operators take exactly one right-hand operand".into()));
    }
    let op = match op_str {
        "==" => ComparisonOperator::Eq,
        "!=" => ComparisonOperator::Ne,
        "<=" => ComparisonOperator::Le,
        ">=" => ComparisonOperator::Ge,
        "<" => ComparisonOperator::Lt,
        ">" => ComparisonOperator::Gt,
        other => return Err(QueryError::Parse(format!("unknown operator {other}"))),
    };

    match rhs_operands.into_iter().next().unwrap() {
        Operand::Arg(arg) => Ok(Predicate::ColumnToArg { col, op, arg }),
        Operand::Column(col_b) => Ok(Predicate::ColumnToColumn { col_a: col, op, col_b }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_d_filter() {
        let q = parse("a == ?1 && b > ?2 && c < ?3").unwrap();
        match q.filter {
            Predicate::And(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parses_projection_and_order_by() {
        let q = parse("{name, age} name == \"ada\" +age,-!id").unwrap();
        assert_eq!(q.projection, Projection::Columns(vec!["name".into(), "age".into()]));
        assert_eq!(q.order_by.len(), 2);
        assert!(!q.order_by[0].descending);
        assert!(q.order_by[1].descending);
        assert_eq!(q.order_by[1].nulls, NullsOrderClause::Low);
    }

    #[test]
    fn parses_in_filter() {
        let q = parse("status in (?1, ?2, \"x\")").unwrap();
        match q.filter {
            Predicate::InFilter { col, args, negate } => {
                assert_eq!(col, "status");
                assert_eq!(args.len(), 3);
                assert!(!negate);
            }
            other => panic!("expected InFilter, got {other:?}"),
        }
    }

    #[test]
    fn parses_or_and_not_and_parens() {
        let q = parse("!(a == ?1 || b == ?2)").unwrap();
        match q.filter {
            Predicate::Not(inner) => match *inner {
                Predicate::Or(terms) => assert_eq!(terms.len(), 2),
                other => panic!("expected Or inside Not, got {other:?}"),
            },
            other => panic!("expected Not, got {other:?}"),
        }
    }
}
