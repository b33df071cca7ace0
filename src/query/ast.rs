//! Abstract syntax tree for read-only pattern queries

use crate::value::Value;

/// A complete `MATCH ... RETURN ...` query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Comma-separated paths of the MATCH clause; variables are shared
    pub paths: Vec<PathPattern>,
    pub where_clause: Option<Expression>,
    pub return_clause: ReturnClause,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    /// Whether the RETURN clause groups rows
    pub fn is_aggregating(&self) -> bool {
        self.return_clause.items.iter().any(|i| i.expression.is_aggregate())
    }
}

/// `(a)-[r]->(b)<-[]-(c)`: a start node followed by edge/node hops
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub edge: EdgePattern,
    pub node: NodePattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    /// Node tables; a node matches if it belongs to any of them
    pub labels: Vec<String>,
    /// Inline `{key: value}` equality constraints
    pub properties: Vec<(String, Expression)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePattern {
    pub variable: Option<String>,
    /// Edge tables; empty matches any
    pub types: Vec<String>,
    pub direction: Direction,
    /// Set for variable-length edges such as `[*1..2]`
    pub length: Option<LengthPattern>,
    pub properties: Vec<(String, Expression)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-[]->`
    Outgoing,
    /// `<-[]-`
    Incoming,
    /// `-[]-`
    Both,
}

/// Hop bounds of a variable-length edge; `max: None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPattern {
    pub min: usize,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub items: Vec<ReturnItem>,
    pub distinct: bool,
    /// `RETURN *`
    pub star: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expression: Expression,
    pub alias: Option<String>,
    /// Source text of the expression, used as the column name without an alias
    pub text: String,
}

impl ReturnItem {
    pub fn column_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expression: Expression,
    pub ascending: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `$name`, bound from the query parameters at run time
    Parameter(String),
    Variable(String),
    Property {
        variable: String,
        property: String,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// `count(*)`
    CountStar,
}

/// Functions that fold many rows into one value
pub const AGGREGATE_FUNCTIONS: &[&str] = &["count", "sum", "avg", "min", "max"];

impl Expression {
    /// Whether this expression is itself an aggregate call
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expression::CountStar => true,
            Expression::Function { name, .. } => {
                AGGREGATE_FUNCTIONS.iter().any(|f| name.eq_ignore_ascii_case(f))
            }
            _ => false,
        }
    }

    /// Whether an aggregate appears anywhere below the top level
    pub fn contains_nested_aggregate(&self) -> bool {
        match self {
            Expression::Binary { left, right, .. } => {
                left.is_aggregate()
                    || right.is_aggregate()
                    || left.contains_nested_aggregate()
                    || right.contains_nested_aggregate()
            }
            Expression::Not(inner) | Expression::IsNull { expr: inner, .. } => {
                inner.is_aggregate() || inner.contains_nested_aggregate()
            }
            Expression::Function { args, .. } => args
                .iter()
                .any(|a| a.is_aggregate() || a.contains_nested_aggregate()),
            _ => false,
        }
    }
}
