//! Query-tree nodes as seen by the planner
//!
//! The host engine owns parsing and evaluation; the planner only needs to
//! know a node's kind, its operator name and its literal arguments.

use ceresprom_core::Matcher;
use std::fmt;

/// A PromQL expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    NumberLiteral(f64),
    StringLiteral(String),
    /// Instant vector selector, e.g. `cpu{host="a"}`
    VectorSelector { matchers: Vec<Matcher> },
    /// Range vector selector, e.g. `cpu[5m]`; range in milliseconds
    MatrixSelector { vector: Box<Node>, range: i64 },
    /// Function call, e.g. `rate(cpu[5m])`
    Call { func: String, args: Vec<Node> },
    /// Aggregation, e.g. `topk by (host) (3, cpu)`
    Aggregate {
        op: String,
        expr: Box<Node>,
        param: Option<Box<Node>>,
        grouping: Vec<String>,
        without: bool,
    },
    Paren(Box<Node>),
    /// Subquery, e.g. `rate(cpu[1m])[10m:30s]`; durations in milliseconds
    Subquery {
        expr: Box<Node>,
        range: i64,
        step: i64,
    },
    Binary {
        op: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary { op: String, expr: Box<Node> },
    /// A list of expressions, such as a call's argument list
    Expressions(Vec<Node>),
}

impl Node {
    pub fn number(v: f64) -> Self {
        Node::NumberLiteral(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Node::StringLiteral(v.into())
    }

    pub fn vector(matchers: Vec<Matcher>) -> Self {
        Node::VectorSelector { matchers }
    }

    pub fn matrix(vector: Node, range: i64) -> Self {
        Node::MatrixSelector {
            vector: Box::new(vector),
            range,
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call {
            func: func.into(),
            args,
        }
    }

    /// Aggregation without a parameter
    pub fn aggregate(op: impl Into<String>, expr: Node, grouping: Vec<String>, without: bool) -> Self {
        Node::Aggregate {
            op: op.into(),
            expr: Box::new(expr),
            param: None,
            grouping,
            without,
        }
    }

    /// Attach a parameter to an aggregation; other nodes are returned as is
    pub fn with_param(self, p: Node) -> Self {
        match self {
            Node::Aggregate {
                op,
                expr,
                grouping,
                without,
                ..
            } => Node::Aggregate {
                op,
                expr,
                param: Some(Box::new(p)),
                grouping,
                without,
            },
            other => other,
        }
    }

    pub fn paren(expr: Node) -> Self {
        Node::Paren(Box::new(expr))
    }

    pub fn subquery(expr: Node, range: i64, step: i64) -> Self {
        Node::Subquery {
            expr: Box::new(expr),
            range,
            step,
        }
    }

    pub fn binary(op: impl Into<String>, lhs: Node, rhs: Node) -> Self {
        Node::Binary {
            op: op.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Short name of the node kind
    pub fn kind(&self) -> &'static str {
        match self {
            Node::NumberLiteral(_) => "number",
            Node::StringLiteral(_) => "string",
            Node::VectorSelector { .. } => "vector_selector",
            Node::MatrixSelector { .. } => "matrix_selector",
            Node::Call { .. } => "call",
            Node::Aggregate { .. } => "aggregate",
            Node::Paren(_) => "paren",
            Node::Subquery { .. } => "subquery",
            Node::Binary { .. } => "binary",
            Node::Unary { .. } => "unary",
            Node::Expressions(_) => "expressions",
        }
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, Node::Subquery { .. })
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::NumberLiteral(v) => write!(f, "{}", v),
            Node::StringLiteral(s) => write!(f, "{:?}", s),
            Node::VectorSelector { matchers } => {
                write!(f, "{{")?;
                for (i, m) in matchers.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, "}}")
            }
            Node::MatrixSelector { vector, range } => write!(f, "{}[{}ms]", vector, range),
            Node::Call { func, args } => {
                write!(f, "{}(", func)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Node::Aggregate {
                op,
                expr,
                param,
                grouping,
                without,
            } => {
                write!(f, "{}", op)?;
                if !grouping.is_empty() || *without {
                    let kw = if *without { "without" } else { "by" };
                    write!(f, " {} ({}) ", kw, grouping.join(", "))?;
                }
                match param {
                    Some(p) => write!(f, "({}, {})", p, expr),
                    None => write!(f, "({})", expr),
                }
            }
            Node::Paren(expr) => write!(f, "({})", expr),
            Node::Subquery { expr, range, step } => write!(f, "{}[{}ms:{}ms]", expr, range, step),
            Node::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Node::Unary { op, expr } => write!(f, "{}{}", op, expr),
            Node::Expressions(items) => write_list(f, items),
        }
    }
}
