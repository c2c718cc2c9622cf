//! End-to-end planning scenarios against an in-memory store

use ceresprom_core::{Label, Matcher};
use ceresprom_proto::{
    Expr, FilterType, PrometheusQueryResponse, ResponseHeader, Sample, SubExprType, TimeSeries,
};
use ceresprom_query::matchers::PUSHDOWN_LABEL;
use ceresprom_query::{series_to_matrix, Node, PushdownConfig, PushdownHelper, QueryError};
use ceresprom_storage::{MemoryClient, Querier, SeriesSlot};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

const FIVE_MINUTES: i64 = 5 * 60 * 1000;

fn slot() -> SeriesSlot {
    Arc::new(RwLock::new(Vec::new()))
}

fn cpu_matchers() -> Vec<Matcher> {
    vec![Matcher::equal("__name__", "cpu")]
}

fn cpu_selector() -> Node {
    Node::vector(cpu_matchers())
}

fn rate_cpu() -> Node {
    Node::call("rate", vec![Node::matrix(cpu_selector(), FIVE_MINUTES)])
}

/// Ancestor path of the selector in `rate(cpu[5m])`, root first
fn rate_path() -> Vec<Node> {
    vec![rate_cpu(), Node::matrix(cpu_selector(), FIVE_MINUTES)]
}

/// Ancestor path of the selector in `sum(rate(cpu[5m]) * 2)`, root first
fn sum_times_two_path() -> Vec<Node> {
    let mul = Node::binary("*", rate_cpu(), Node::number(2.0));
    vec![
        Node::aggregate("sum", mul.clone(), vec![], false),
        mul,
        rate_cpu(),
        Node::matrix(cpu_selector(), FIVE_MINUTES),
    ]
}

#[test]
fn test_rate_folds_into_function() {
    let config = PushdownConfig::default();
    let path = rate_path();
    let (metric, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .time_range(0, 3_600_000)
        .step(15_000)
        .matrix_range(FIVE_MINUTES)
        .to_expr(slot())
        .unwrap();

    assert_eq!(metric, "cpu");
    let sub = outcome.expr.as_sub_expr().unwrap();
    assert_eq!(sub.op_type, SubExprType::Func);
    assert_eq!(sub.operator, "rate");
    assert_eq!(sub.operands.len(), 1);
    assert!(matches!(sub.operands[0], Expr::Operand(_)));

    let selector = outcome.expr.base_selector().unwrap();
    assert_eq!(selector.measurement, "cpu");
    assert_eq!(selector.range, FIVE_MINUTES);
    assert_eq!(selector.step, 15_000);

    assert!(outcome.is_pushed_down(0));
    assert!(!outcome.is_pushed_down(1));
}

#[test]
fn test_single_node_path_folds_root() {
    let config = PushdownConfig::default();
    let path = vec![rate_cpu()];
    let (metric, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .matrix_range(FIVE_MINUTES)
        .to_expr(slot())
        .unwrap();

    assert_eq!(metric, "cpu");
    let sub = outcome.expr.as_sub_expr().unwrap();
    assert_eq!(sub.op_type, SubExprType::Func);
    assert_eq!(sub.operator, "rate");
    assert!(outcome.is_pushed_down(0));
    assert_eq!(outcome.outermost(), Some(0));
    assert_eq!(outcome.marks.len(), 1);
}

#[test]
fn test_fold_stops_at_binary() {
    let config = PushdownConfig::default();
    let path = sum_times_two_path();
    let (_, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .to_expr(slot())
        .unwrap();

    assert_eq!(outcome.expr.depth(), 1);
    assert_eq!(outcome.expr.as_sub_expr().unwrap().operator, "rate");
    assert!(outcome.is_pushed_down(2));
    assert!(!outcome.is_pushed_down(1));
    // sum sits above the multiplication and is never reached
    assert!(!outcome.is_pushed_down(0));
    assert_eq!(outcome.outermost(), Some(2));
}

#[test]
fn test_nested_aggregate_over_function() {
    let config = PushdownConfig::default();
    let path = vec![
        Node::aggregate("sum", rate_cpu(), vec!["host".to_string()], false),
        Node::paren(rate_cpu()),
        rate_cpu(),
        Node::matrix(cpu_selector(), FIVE_MINUTES),
    ];
    let (_, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .to_expr(slot())
        .unwrap();

    let sum = outcome.expr.as_sub_expr().unwrap();
    assert_eq!(sum.op_type, SubExprType::Aggr);
    assert_eq!(sum.operator, "sum");
    assert_eq!(sum.group, vec!["host"]);
    assert_eq!(sum.operands[0].as_sub_expr().unwrap().operator, "rate");
    assert_eq!(outcome.expr.depth(), 2);
    assert_eq!(outcome.marks.len(), 2);
}

#[test]
fn test_subquery_anywhere_disables_pushdown() {
    let config = PushdownConfig::default();
    let path = vec![
        Node::aggregate("max", Node::number(0.0), vec![], false),
        Node::subquery(rate_cpu(), 600_000, 30_000),
        rate_cpu(),
        Node::matrix(cpu_selector(), FIVE_MINUTES),
    ];
    let (_, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .to_expr(slot())
        .unwrap();

    assert!(outcome.expr.as_sub_expr().is_none());
    assert!(outcome.marks.is_empty());
}

#[test]
fn test_pushdown_label_disables_pushdown() {
    let config = PushdownConfig::default();
    let path = rate_path();
    let mut matchers = cpu_matchers();
    matchers.push(Matcher::equal(PUSHDOWN_LABEL, "false"));

    let (_, outcome) = PushdownHelper::new(matchers, &path, &config)
        .to_expr(slot())
        .unwrap();

    assert!(outcome.expr.as_sub_expr().is_none());
    assert!(outcome.expr.base_selector().unwrap().filters.is_empty());
}

#[test]
fn test_unsupported_call_leaves_expr_unmarked() {
    let config = PushdownConfig::default();
    let path = vec![Node::call("abs", vec![cpu_selector()])];
    let (_, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .to_expr(slot())
        .unwrap();

    assert!(outcome.expr.as_sub_expr().is_none());
    assert!(!outcome.is_pushed_down(0));
}

#[test]
fn test_invalid_metric_matcher() {
    let config = PushdownConfig::default();
    let path = rate_path();
    let err = PushdownHelper::new(vec![Matcher::regexp("__name__", "cpu|mem")], &path, &config)
        .to_expr(slot())
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidMatcher { .. }));
}

#[test]
fn test_unknown_match_operator() {
    let err: QueryError = Matcher::parse("host", "~=", "a").unwrap_err().into();
    assert!(matches!(err, QueryError::UnsupportedMatchType(ref op) if op == "~="));
}

#[test]
fn test_alternation_rewrite_to_literal_set() {
    let config = PushdownConfig {
        literal_or_rewrite: true,
        ..Default::default()
    };
    let matchers = vec![
        Matcher::equal("__name__", "cpu"),
        Matcher::regexp("host", "a|b"),
    ];
    let (_, outcome) = PushdownHelper::new(matchers, &[], &config)
        .to_expr(slot())
        .unwrap();

    let filters = &outcome.expr.base_selector().unwrap().filters;
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].tag_key, "host");
    assert_eq!(filters[0].operators.len(), 1);
    assert_eq!(filters[0].operators[0].filter_type, FilterType::LiteralOr);
    assert_eq!(filters[0].operators[0].params, vec!["a", "b"]);
}

#[test]
fn test_replanning_is_idempotent() {
    let config = PushdownConfig::default();
    let path = sum_times_two_path();
    let helper = PushdownHelper::new(cpu_matchers(), &path, &config).time_range(0, 60_000);

    let (_, first) = helper.to_expr(slot()).unwrap();
    let (_, second) = helper.to_expr(first.slot.clone()).unwrap();

    assert_eq!(first.expr, second.expr);
    let first_idx: Vec<usize> = first.marks.iter().map(|m| m.index).collect();
    let second_idx: Vec<usize> = second.marks.iter().map(|m| m.index).collect();
    assert_eq!(first_idx, second_idx);
}

#[tokio::test]
async fn test_partial_fold_feeds_first_local_node() {
    let config = PushdownConfig::default();
    let path = sum_times_two_path();
    let (metric, outcome) = PushdownHelper::new(cpu_matchers(), &path, &config)
        .time_range(0, 30_000)
        .step(15_000)
        .to_expr(slot())
        .unwrap();

    // the store returns already-computed rates
    let client = Arc::new(MemoryClient::new());
    client.set_query_response(PrometheusQueryResponse {
        header: ResponseHeader::ok(),
        timeseries: vec![
            TimeSeries {
                labels: vec![Label::new("host", "a")],
                samples: vec![Sample::new(0, 0.5), Sample::new(15_000, 1.5)],
            },
            TimeSeries {
                labels: vec![Label::new("host", "b")],
                samples: vec![],
            },
        ],
    });

    let querier = Querier::new(client.clone(), Duration::from_secs(1));
    let series = querier
        .select(&outcome.select_hints(metric))
        .await
        .into_series()
        .unwrap();
    outcome.bind(series);

    assert_eq!(client.queries()[0].expr, outcome.expr);

    // the multiplication reads the rate node's bound series, not raw samples
    let rate_idx = outcome.outermost().unwrap();
    let bound = outcome.bound_series(rate_idx).unwrap().read().clone();
    let matrix = series_to_matrix(&bound);
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix[0].labels.metric_name(), None);

    let doubled: Vec<f64> = matrix[0].points.iter().map(|p| p.value * 2.0).collect();
    assert_eq!(doubled, vec![1.0, 3.0]);
}
