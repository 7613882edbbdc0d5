use crate::support::{parse_op_or_exit, print_json_or_exit};
use intense_kernel::{ContextOp, Limits};
use serde_json::json;

pub fn run(first: String, second: String, limits: &Limits, json_output: bool) {
    let first = parse_op_or_exit(&first, limits);
    let second = parse_op_or_exit(&second, limits);
    let composed = ContextOp::compose(&first, &second);

    if json_output {
        print_json_or_exit(&json!({
            "first": first.canonical(),
            "second": second.canonical(),
            "composed": composed.canonical(),
            "short": composed.short_canonical(),
        }));
    } else {
        println!("{}", composed.canonical());
    }
}
