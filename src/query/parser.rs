//! Cypher query parser using Pest

use crate::query::ast::*;
use crate::value::Value;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query/cypher.pest"]
struct CypherParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
        .op(Op::infix(Rule::comparison_op, Assoc::Left) | Op::infix(Rule::string_op, Assoc::Left))
        .op(Op::infix(Rule::add_sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_div_op, Assoc::Left))
        .op(Op::postfix(Rule::null_check))
});

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Pest parsing error
    #[error("Parse error: {0}")]
    PestError(#[from] Box<pest::error::Error<Rule>>),

    /// Semantic error
    #[error("Semantic error: {0}")]
    SemanticError(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::PestError(Box::new(err))
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

fn semantic(msg: impl Into<String>) -> ParseError {
    ParseError::SemanticError(msg.into())
}

/// Parse a query string into an AST
pub fn parse_query(input: &str) -> ParseResult<Query> {
    let pair = CypherParser::parse(Rule::query, input)?
        .next()
        .ok_or_else(|| semantic("Empty query"))?;

    let mut paths = Vec::new();
    let mut where_clause = None;
    let mut return_clause = None;
    let mut order_by = Vec::new();
    let mut skip = None;
    let mut limit = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::match_clause => {
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::pattern {
                        paths = parse_pattern(part)?;
                    }
                }
            }
            Rule::where_clause => where_clause = Some(parse_where_clause(inner)?),
            Rule::return_clause => return_clause = Some(parse_return_clause(inner)?),
            Rule::order_by_clause => order_by = parse_order_by_clause(inner)?,
            Rule::skip_clause => skip = Some(parse_count_clause(inner)?),
            Rule::limit_clause => limit = Some(parse_count_clause(inner)?),
            _ => {}
        }
    }

    Ok(Query {
        paths,
        where_clause,
        return_clause: return_clause.ok_or_else(|| semantic("Missing RETURN clause"))?,
        order_by,
        skip,
        limit,
    })
}

fn parse_pattern(pair: Pair<Rule>) -> ParseResult<Vec<PathPattern>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::path)
        .map(parse_path)
        .collect()
}

fn parse_path(pair: Pair<Rule>) -> ParseResult<PathPattern> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node => nodes.push(parse_node(inner)?),
            Rule::edge_pattern => edges.push(parse_edge(inner)?),
            _ => {}
        }
    }

    if nodes.is_empty() {
        return Err(semantic("Path must have at least one node"));
    }

    let start = nodes.remove(0);
    let segments = edges
        .into_iter()
        .zip(nodes)
        .map(|(edge, node)| PathSegment { edge, node })
        .collect();

    Ok(PathPattern { start, segments })
}

fn parse_node(pair: Pair<Rule>) -> ParseResult<NodePattern> {
    let mut variable = None;
    let mut labels = Vec::new();
    let mut properties = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::variable => variable = Some(inner.as_str().to_string()),
            Rule::labels => {
                labels = inner
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::label)
                    .map(|p| p.as_str().to_string())
                    .collect();
            }
            Rule::properties => properties = parse_properties(inner)?,
            _ => {}
        }
    }

    Ok(NodePattern {
        variable,
        labels,
        properties,
    })
}

fn parse_edge(pair: Pair<Rule>) -> ParseResult<EdgePattern> {
    let edge_str = pair.as_str();
    let direction = match (edge_str.starts_with('<'), edge_str.ends_with('>')) {
        (true, false) => Direction::Incoming,
        (false, true) => Direction::Outgoing,
        _ => Direction::Both,
    };

    let mut variable = None;
    let mut types = Vec::new();
    let mut length = None;
    let mut properties = Vec::new();

    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::edge_detail {
            continue;
        }
        for detail in inner.into_inner() {
            match detail.as_rule() {
                Rule::variable => variable = Some(detail.as_str().to_string()),
                Rule::edge_types => {
                    types = detail
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::edge_type)
                        .map(|p| p.as_str().to_string())
                        .collect();
                }
                Rule::length_pattern => length = Some(parse_length_pattern(detail)?),
                Rule::properties => properties = parse_properties(detail)?,
                _ => {}
            }
        }
    }

    if let (Some(name), Some(_)) = (&variable, &length) {
        return Err(semantic(format!(
            "Variable-length relationship {} cannot be bound to a variable",
            name
        )));
    }

    Ok(EdgePattern {
        variable,
        types,
        direction,
        length,
        properties,
    })
}

fn parse_length_pattern(pair: Pair<Rule>) -> ParseResult<LengthPattern> {
    let Some(inner) = pair.into_inner().next() else {
        // Just * means 1..unbounded
        return Ok(LengthPattern { min: 1, max: None });
    };

    let pattern = match inner.as_rule() {
        Rule::range_pattern => {
            let (min, max) = inner
                .as_str()
                .split_once("..")
                .ok_or_else(|| semantic("Invalid range pattern"))?;
            LengthPattern {
                min: if min.is_empty() { 1 } else { parse_hops(min)? },
                max: if max.is_empty() { None } else { Some(parse_hops(max)?) },
            }
        }
        _ => {
            let exact = parse_hops(inner.as_str())?;
            LengthPattern {
                min: exact,
                max: Some(exact),
            }
        }
    };

    if matches!(pattern.max, Some(max) if max < pattern.min) {
        return Err(semantic(format!(
            "Invalid hop range {}..{}",
            pattern.min,
            pattern.max.unwrap_or_default()
        )));
    }
    Ok(pattern)
}

fn parse_hops(text: &str) -> ParseResult<usize> {
    text.parse()
        .map_err(|_| semantic(format!("Invalid hop count: {}", text)))
}

fn parse_properties(pair: Pair<Rule>) -> ParseResult<Vec<(String, Expression)>> {
    let mut props = Vec::new();

    for prop in pair.into_inner() {
        if prop.as_rule() != Rule::property {
            continue;
        }
        let mut key = String::new();
        let mut value = Expression::Literal(Value::Null);
        for part in prop.into_inner() {
            match part.as_rule() {
                Rule::property_key => key = part.as_str().to_string(),
                Rule::parameter => value = parse_parameter(part),
                _ => value = Expression::Literal(parse_literal(part)?),
            }
        }
        props.push((key, value));
    }

    Ok(props)
}

fn parse_parameter(pair: Pair<Rule>) -> Expression {
    Expression::Parameter(pair.as_str().trim_start_matches('$').to_string())
}

fn parse_literal(pair: Pair<Rule>) -> ParseResult<Value> {
    match pair.as_rule() {
        Rule::null => Ok(Value::Null),
        Rule::boolean => Ok(Value::Boolean(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::integer => pair
            .as_str()
            .parse()
            .map(Value::Int64)
            .map_err(|_| semantic(format!("Integer out of range: {}", pair.as_str()))),
        Rule::float => pair
            .as_str()
            .parse()
            .map(Value::Float64)
            .map_err(|_| semantic(format!("Invalid float: {}", pair.as_str()))),
        Rule::string => {
            let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
            Ok(Value::String(unescape(body)))
        }
        Rule::list => {
            let mut items = Vec::new();
            for item in pair.into_inner() {
                let value = parse_literal(item)?;
                items.push(value.as_float().ok_or_else(|| semantic("List literals must be numeric"))?);
            }
            Ok(Value::Vector(items))
        }
        other => Err(semantic(format!("Unexpected literal: {:?}", other))),
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_where_clause(pair: Pair<Rule>) -> ParseResult<Expression> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .map(parse_expression)
        .unwrap_or_else(|| Err(semantic("Invalid WHERE clause")))
}

fn parse_return_clause(pair: Pair<Rule>) -> ParseResult<ReturnClause> {
    let mut distinct = false;
    let mut star = false;
    let mut items = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::DISTINCT => distinct = true,
            Rule::star => star = true,
            Rule::return_item => items.push(parse_return_item(inner)?),
            _ => {}
        }
    }

    Ok(ReturnClause {
        items,
        distinct,
        star,
    })
}

fn parse_return_item(pair: Pair<Rule>) -> ParseResult<ReturnItem> {
    let mut expression = None;
    let mut alias = None;
    let mut text = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::expression => {
                text = inner.as_str().trim().to_string();
                expression = Some(parse_expression(inner)?);
            }
            Rule::variable => alias = Some(inner.as_str().to_string()),
            _ => {}
        }
    }

    Ok(ReturnItem {
        expression: expression.ok_or_else(|| semantic("Missing expression in RETURN"))?,
        alias,
        text,
    })
}

fn parse_order_by_clause(pair: Pair<Rule>) -> ParseResult<Vec<OrderItem>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::order_item)
        .map(parse_order_item)
        .collect()
}

fn parse_order_item(pair: Pair<Rule>) -> ParseResult<OrderItem> {
    let mut expression = None;
    let mut ascending = true;
    let mut text = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::expression => {
                text = inner.as_str().trim().to_string();
                expression = Some(parse_expression(inner)?);
            }
            Rule::DESC => ascending = false,
            _ => {}
        }
    }

    Ok(OrderItem {
        expression: expression.ok_or_else(|| semantic("Missing expression in ORDER BY"))?,
        ascending,
        text,
    })
}

fn parse_count_clause(pair: Pair<Rule>) -> ParseResult<usize> {
    let text = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::integer)
        .map(|p| p.as_str())
        .unwrap_or_default();
    text.parse()
        .map_err(|_| semantic(format!("SKIP/LIMIT expects a non-negative integer, got {}", text)))
}

fn parse_expression(pair: Pair<Rule>) -> ParseResult<Expression> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op, operand| match op.as_rule() {
            Rule::not_op => Ok(Expression::Not(Box::new(operand?))),
            other => Err(semantic(format!("Unexpected prefix operator: {:?}", other))),
        })
        .map_postfix(|operand, op| match op.as_rule() {
            Rule::null_check => Ok(Expression::IsNull {
                expr: Box::new(operand?),
                negated: op.into_inner().any(|p| p.as_rule() == Rule::NOT),
            }),
            other => Err(semantic(format!("Unexpected postfix operator: {:?}", other))),
        })
        .map_infix(|left, op, right| {
            let left = left?;
            let right = right?;

            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::comparison_op | Rule::add_sub_op | Rule::mul_div_op | Rule::string_op => {
                    parse_op_str(op.as_str())?
                }
                other => return Err(semantic(format!("Unexpected operator: {:?}", other))),
            };

            Ok(Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })
        })
        .parse(pair.into_inner())
}

fn parse_op_str(op_str: &str) -> ParseResult<BinaryOp> {
    let normalized = op_str.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(match normalized.as_str() {
        "=" => BinaryOp::Eq,
        "!=" | "<>" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        s if s.eq_ignore_ascii_case("STARTS WITH") => BinaryOp::StartsWith,
        s if s.eq_ignore_ascii_case("ENDS WITH") => BinaryOp::EndsWith,
        s if s.eq_ignore_ascii_case("CONTAINS") => BinaryOp::Contains,
        _ => return Err(semantic(format!("Unknown operator: {}", op_str))),
    })
}

fn parse_primary(pair: Pair<Rule>) -> ParseResult<Expression> {
    match pair.as_rule() {
        Rule::count_star => Ok(Expression::CountStar),
        Rule::function_call => parse_function_call(pair),
        Rule::parameter => Ok(parse_parameter(pair)),
        Rule::property_access => parse_property_access(pair),
        Rule::variable => Ok(Expression::Variable(pair.as_str().to_string())),
        Rule::expression => parse_expression(pair),
        _ => parse_literal(pair).map(Expression::Literal),
    }
}

fn parse_property_access(pair: Pair<Rule>) -> ParseResult<Expression> {
    let parts: Vec<_> = pair.into_inner().collect();

    if parts.len() != 2 {
        return Err(semantic("Invalid property access"));
    }

    Ok(Expression::Property {
        variable: parts[0].as_str().to_string(),
        property: parts[1].as_str().to_string(),
    })
}

fn parse_function_call(pair: Pair<Rule>) -> ParseResult<Expression> {
    let mut name = String::new();
    let mut args = Vec::new();
    let mut distinct = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::function_name => name = inner.as_str().to_string(),
            Rule::DISTINCT => distinct = true,
            Rule::expression => args.push(parse_expression(inner)?),
            _ => {}
        }
    }

    Ok(Expression::Function { name, args, distinct })
}
