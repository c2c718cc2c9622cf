//! The delegated expression tree
//!
//! An `Expr` is either a leaf `Operand` or a `SubExpr` applying an aggregate
//! or function to child expressions. When nothing could be pushed down the
//! tree is exactly the bare selector operand.

use serde::{Deserialize, Serialize};

/// Node of the delegated computation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Operand(Operand),
    SubExpr(SubExpr),
}

impl Expr {
    /// Leaf wrapping a selector
    pub fn selector(selector: Selector) -> Self {
        Expr::Operand(Operand::Selector(selector))
    }

    /// Leaf wrapping a float literal
    pub fn float(value: f64) -> Self {
        Expr::Operand(Operand::FloatVal(value))
    }

    /// Leaf wrapping a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Operand(Operand::StringVal(value.into()))
    }

    pub fn as_sub_expr(&self) -> Option<&SubExpr> {
        match self {
            Expr::SubExpr(sub) => Some(sub),
            Expr::Operand(_) => None,
        }
    }

    /// The selector at the bottom of the first-operand chain
    pub fn base_selector(&self) -> Option<&Selector> {
        match self {
            Expr::Operand(Operand::Selector(s)) => Some(s),
            Expr::Operand(_) => None,
            Expr::SubExpr(sub) => sub.operands.first().and_then(Expr::base_selector),
        }
    }

    /// Number of sub-expressions stacked above the base selector
    pub fn depth(&self) -> usize {
        match self {
            Expr::Operand(_) => 0,
            Expr::SubExpr(sub) => 1 + sub.operands.first().map_or(0, Expr::depth),
        }
    }
}

/// Leaf value of the expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    FloatVal(f64),
    StringVal(String),
    Selector(Selector),
}

/// Description of the raw series to read
///
/// `align_start`/`align_end` are used for step alignment on the remote
/// side, not for choosing series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub measurement: String,
    pub filters: Vec<Filter>,
    pub start: i64,
    pub end: i64,
    pub align_start: i64,
    pub align_end: i64,
    pub step: i64,
    pub range: i64,
    pub offset: i64,
    pub field: String,
}

/// Tag filter: every operator must accept the tag value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub tag_key: String,
    pub operators: Vec<FilterOperator>,
}

impl Filter {
    /// Filter with a single operator
    pub fn single(tag_key: impl Into<String>, filter_type: FilterType, params: Vec<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
            operators: vec![FilterOperator {
                filter_type,
                params,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOperator {
    pub filter_type: FilterType,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    /// Value equals one of the params
    LiteralOr,
    /// Value equals none of the params
    NotLiteralOr,
    /// Value matches the (anchored) pattern
    Regexp,
    /// Value does not match the (anchored) pattern
    NotRegexpMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubExprType {
    Aggr,
    Func,
}

/// One aggregate or function application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubExpr {
    pub op_type: SubExprType,
    pub operator: String,
    pub operands: Vec<Expr>,
    /// Grouping labels, aggregates only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<String>,
    /// `without` instead of `by`, aggregates only
    #[serde(default)]
    pub without: bool,
}
