//! Pushdown planner
//!
//! Given the ancestor path of a vector selector (root first), the planner
//! builds the base selector and then folds nodes into a delegated
//! expression, starting next to the selector and moving outward. The walk
//! stops at the first node the remote store cannot evaluate; that node and
//! everything above it run locally against whatever was folded so far.
//!
//! Nodes folded as aggregates or functions are reported back as
//! `PushdownMark`s so the host can skip evaluating them again and read the
//! series bound to the query instead.

use crate::error::Result;
use crate::matchers::{normalize_matchers, PushdownConfig, QueryParam};
use crate::model::Node;
use ceresprom_core::Matcher;
use ceresprom_proto::{Expr, Selector, SubExpr, SubExprType};
use ceresprom_storage::{RemoteSeries, SelectHints, SeriesSlot};
use std::sync::Arc;
use tracing::debug;

/// Aggregations the remote store evaluates
const PUSHDOWN_AGGREGATES: &[&str] = &["sum", "max", "min", "count", "avg"];

/// Functions the remote store evaluates
const PUSHDOWN_FUNCTIONS: &[&str] = &["rate", "irate", "delta", "idelta", "increase"];

/// Outcome of translating one node against the current expression
#[derive(Debug, Clone)]
pub struct Translated {
    pub expr: Expr,
    pub pushed_down: bool,
    /// Series slot the node now reads from, set for folded calls and aggregates
    pub bound: Option<SeriesSlot>,
}

impl Translated {
    fn pushed(expr: Expr) -> Self {
        Self {
            expr,
            pushed_down: true,
            bound: None,
        }
    }

    fn bound(expr: Expr, slot: &SeriesSlot) -> Self {
        Self {
            expr,
            pushed_down: true,
            bound: Some(Arc::clone(slot)),
        }
    }

    fn declined(expr: Expr) -> Self {
        Self {
            expr,
            pushed_down: false,
            bound: None,
        }
    }
}

impl Node {
    /// Fold this node on top of `base`.
    ///
    /// On decline the returned expression is `base` unchanged.
    pub fn translate(&self, base: Expr, slot: &SeriesSlot) -> Translated {
        match self {
            Node::Paren(_) | Node::MatrixSelector { .. } | Node::Expressions(_) => {
                Translated::pushed(base)
            }
            Node::Call { func, args } => translate_call(func, args, base, slot),
            Node::Aggregate {
                op,
                param,
                grouping,
                without,
                ..
            } => translate_aggregate(op, param.as_deref(), grouping, *without, base, slot),
            _ => Translated::declined(base),
        }
    }
}

fn translate_call(func: &str, args: &[Node], base: Expr, slot: &SeriesSlot) -> Translated {
    if !PUSHDOWN_FUNCTIONS.contains(&func) {
        return Translated::declined(base);
    }

    let mut trailing = Vec::with_capacity(args.len().saturating_sub(1));
    for arg in args.iter().skip(1) {
        match arg {
            Node::NumberLiteral(v) => trailing.push(Expr::float(*v)),
            other => {
                debug!(func, arg = %other, "Call argument is not a literal, not pushing down");
                return Translated::declined(base);
            }
        }
    }

    let mut operands = Vec::with_capacity(trailing.len() + 1);
    operands.push(base);
    operands.extend(trailing);

    Translated::bound(
        Expr::SubExpr(SubExpr {
            op_type: SubExprType::Func,
            operator: func.to_string(),
            operands,
            group: Vec::new(),
            without: false,
        }),
        slot,
    )
}

fn translate_aggregate(
    op: &str,
    param: Option<&Node>,
    grouping: &[String],
    without: bool,
    base: Expr,
    slot: &SeriesSlot,
) -> Translated {
    if !PUSHDOWN_AGGREGATES.contains(&op) {
        return Translated::declined(base);
    }

    let operands = match param {
        Some(Node::NumberLiteral(v)) => vec![base, Expr::float(*v)],
        Some(Node::StringLiteral(s)) => vec![base, Expr::string(s.clone())],
        // The store has no way to take a second series input
        Some(Node::VectorSelector { .. }) => {
            debug!(op, "Aggregate parameter is a selector, not pushing down");
            return Translated::declined(base);
        }
        _ => vec![base],
    };

    Translated::bound(
        Expr::SubExpr(SubExpr {
            op_type: SubExprType::Aggr,
            operator: op.to_string(),
            operands,
            group: grouping.to_vec(),
            without,
        }),
        slot,
    )
}

/// A path node whose evaluation was delegated to the remote store
#[derive(Debug, Clone)]
pub struct PushdownMark {
    /// Index into the ancestor path
    pub index: usize,
    /// Series the node reads instead of evaluating its input
    pub series: SeriesSlot,
}

/// Result of planning one selector
#[derive(Debug, Clone)]
pub struct PushdownOutcome {
    pub expr: Expr,
    pub marks: Vec<PushdownMark>,
    pub slot: SeriesSlot,
}

impl PushdownOutcome {
    /// Whether the path node at `index` was folded into `expr`
    pub fn is_pushed_down(&self, index: usize) -> bool {
        self.marks.iter().any(|m| m.index == index)
    }

    /// Series bound to the path node at `index`, if it was folded
    pub fn bound_series(&self, index: usize) -> Option<&SeriesSlot> {
        self.marks.iter().find(|m| m.index == index).map(|m| &m.series)
    }

    /// Outermost folded path node; the host reads remote series from here
    pub fn outermost(&self) -> Option<usize> {
        self.marks.iter().map(|m| m.index).min()
    }

    /// Hints for selecting the delegated expression
    pub fn select_hints(&self, metric: impl Into<String>) -> SelectHints {
        SelectHints {
            metric: metric.into(),
            pushdown_expr: self.expr.clone(),
        }
    }

    /// Store fetched series into the shared slot
    pub fn bind(&self, series: Vec<RemoteSeries>) {
        *self.slot.write() = series;
    }
}

/// Plans pushdown for one vector selector
pub struct PushdownHelper<'a> {
    start: i64,
    end: i64,
    step: i64,
    align_start: i64,
    align_end: i64,
    offset: i64,
    matrix_range: i64,
    matchers: Vec<Matcher>,
    path: &'a [Node],
    config: &'a PushdownConfig,
}

impl<'a> PushdownHelper<'a> {
    /// Create a helper for the selector's matchers and its ancestor path
    /// (root first, selector excluded)
    pub fn new(matchers: Vec<Matcher>, path: &'a [Node], config: &'a PushdownConfig) -> Self {
        Self {
            start: 0,
            end: 0,
            step: 0,
            align_start: 0,
            align_end: 0,
            offset: 0,
            matrix_range: 0,
            matchers,
            path,
            config,
        }
    }

    /// Set the query time range (milliseconds)
    pub fn time_range(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Set the evaluation step; 0 is treated as 1
    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// Set the alignment bounds
    pub fn align(mut self, start: i64, end: i64) -> Self {
        self.align_start = start;
        self.align_end = end;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the range of an enclosing matrix selector
    pub fn matrix_range(mut self, range: i64) -> Self {
        self.matrix_range = range;
        self
    }

    /// Build the delegated expression, returning the metric it reads.
    ///
    /// Fails only on invalid matchers; ineligible nodes just end the fold.
    pub fn to_expr(&self, slot: SeriesSlot) -> Result<(String, PushdownOutcome)> {
        let (matchers, enabled) = normalize_matchers(&self.matchers, self.config);
        let param = QueryParam::from_matchers(&matchers, self.config)?;

        let mut expr = Expr::selector(Selector {
            measurement: param.metric.clone(),
            filters: param.filters,
            start: self.start,
            end: self.end,
            align_start: self.align_start,
            align_end: self.align_end,
            step: if self.step == 0 { 1 } else { self.step },
            range: self.matrix_range,
            offset: self.offset,
            field: param.field,
        });
        let mut marks = Vec::new();

        if !enabled {
            debug!(metric = %param.metric, "Pushdown disabled by matcher");
        } else if self.path.iter().any(Node::is_subquery) {
            debug!(metric = %param.metric, "Path contains a subquery, not pushing down");
        } else {
            for (idx, node) in self.path.iter().enumerate().rev() {
                debug!(idx, kind = node.kind(), node = %node, "Translating path node");
                let translated = node.translate(expr, &slot);
                expr = translated.expr;
                if !translated.pushed_down {
                    break;
                }
                if let Some(series) = translated.bound {
                    marks.push(PushdownMark { index: idx, series });
                }
            }
        }

        debug!(
            metric = %param.metric,
            folded = marks.len(),
            depth = expr.depth(),
            "Planned pushdown"
        );

        Ok((param.metric, PushdownOutcome { expr, marks, slot }))
    }
}
