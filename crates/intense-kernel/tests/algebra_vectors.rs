//! Integration tests: run the algebra fixtures.
//!
//! Each fixture in tests/fixtures/ has:
//! - case.json: the operation (`kind`) and its text-form inputs
//! - expect.json: the expected outcome
//!
//! Compose fixtures also check the composition law on every listed context:
//! applying the composed op must match applying both ops in order.

use intense_kernel::{Context, ContextDomain, ContextOp};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn text<'a>(case: &'a Value, field: &str) -> &'a str {
    case[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing string field `{field}`"))
}

fn ctx(text: &str) -> Context {
    text.parse()
        .unwrap_or_else(|e| panic!("bad context {text}: {e}"))
}

fn op(text: &str) -> ContextOp {
    text.parse().unwrap_or_else(|e| panic!("bad op {text}: {e}"))
}

fn contexts(case: &Value, field: &str) -> Vec<Context> {
    case[field]
        .as_array()
        .unwrap_or_else(|| panic!("missing array field `{field}`"))
        .iter()
        .map(|v| ctx(v.as_str().expect("context entries are strings")))
        .collect()
}

fn evaluate(case: &Value) -> Value {
    match text(case, "kind") {
        "apply" => {
            let mut target = ctx(text(case, "context"));
            target.apply(&op(text(case, "op")));
            json!({
                "result": target.canonical(),
                "basecount": target.basecount(),
            })
        }
        "op" => {
            let parsed = op(text(case, "op"));
            json!({
                "canonical": parsed.canonical(),
                "short": parsed.short_canonical(),
                "basecount": parsed.basecount(),
                "blankcount": parsed.blankcount(),
            })
        }
        "compose" => {
            let first = op(text(case, "first"));
            let second = op(text(case, "second"));
            let composed = ContextOp::compose(&first, &second);
            let results: Vec<String> = contexts(case, "contexts")
                .into_iter()
                .map(|start| {
                    let mut stepwise = start.clone();
                    stepwise.apply(&first).apply(&second);
                    let mut direct = start;
                    direct.apply(&composed);
                    assert_eq!(direct, stepwise, "composition law fails for {composed}");
                    direct.canonical().to_owned()
                })
                .collect();
            json!({
                "composed": composed.canonical(),
                "results": results,
            })
        }
        "compare" => {
            let left = ctx(text(case, "left"));
            let right = ctx(text(case, "right"));
            let ordering = match left.compare(&right) {
                Ordering::Less => "less",
                Ordering::Equal => "equal",
                Ordering::Greater => "greater",
            };
            json!({
                "ordering": ordering,
                "left_refines_right": left.refines_to(&right),
                "right_refines_left": right.refines_to(&left),
            })
        }
        "resolve" => {
            let domain: ContextDomain = contexts(case, "versions").into_iter().collect();
            let resolution = domain.resolve(&ctx(text(case, "request")));
            serde_json::to_value(&resolution).expect("failed to serialize resolution")
        }
        other => panic!("unknown fixture kind: {other}"),
    }
}

fn run_fixture(name: &str) {
    let dir = fixtures_dir().join(name);

    let case_path = dir.join("case.json");
    let expect_path = dir.join("expect.json");

    let case_str = std::fs::read_to_string(&case_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", case_path.display()));
    let expect_str = std::fs::read_to_string(&expect_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", expect_path.display()));

    let case: Value = serde_json::from_str(&case_str)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", case_path.display()));
    let expected: Value = serde_json::from_str(&expect_str)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", expect_path.display()));

    let result = evaluate(&case);

    assert_eq!(
        result,
        expected,
        "\n\nFixture: {name}\n\nGot:\n{}\n\nExpected:\n{}\n",
        serde_json::to_string_pretty(&result).unwrap(),
        serde_json::to_string_pretty(&expected).unwrap(),
    );
}

#[test]
fn apply_clear_all() {
    run_fixture("apply_clear_all");
}

#[test]
fn apply_absent_dimension_untouched() {
    run_fixture("apply_absent_dimension_untouched");
}

#[test]
fn apply_clear_base_prunes_empty_node() {
    run_fixture("apply_clear_base_prunes_empty_node");
}

#[test]
fn apply_clear_base_keeps_node_with_content() {
    run_fixture("apply_clear_base_keeps_node_with_content");
}

#[test]
fn op_clear_all_counts() {
    run_fixture("op_clear_all_counts");
}

#[test]
fn compose_then_replace() {
    run_fixture("compose_then_replace");
}

#[test]
fn compose_clear_then_set() {
    run_fixture("compose_clear_then_set");
}

#[test]
fn compose_clear_base_then_extend() {
    run_fixture("compose_clear_base_then_extend");
}

#[test]
fn compare_prefix_is_less() {
    run_fixture("compare_prefix_is_less");
}

#[test]
fn compare_base_first() {
    run_fixture("compare_base_first");
}

#[test]
fn resolve_best_refined_version() {
    run_fixture("resolve_best_refined_version");
}

#[test]
fn resolve_near_incomparable() {
    run_fixture("resolve_near_incomparable");
}

#[test]
fn resolve_none() {
    run_fixture("resolve_none");
}
