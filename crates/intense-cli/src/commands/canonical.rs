use crate::support::{parse_context_or_exit, parse_op_or_exit, print_json_or_exit};
use intense_kernel::Limits;
use serde_json::json;

pub fn run(text: String, as_op: bool, limits: &Limits, json_output: bool) {
    if as_op {
        let op = parse_op_or_exit(&text, limits);
        if json_output {
            print_json_or_exit(&json!({
                "kind": "op",
                "canonical": op.canonical(),
                "short": op.short_canonical(),
                "basecount": op.basecount(),
                "blankcount": op.blankcount(),
            }));
        } else {
            println!("{}", op.canonical());
        }
        return;
    }

    let context = parse_context_or_exit(&text, limits);
    if json_output {
        print_json_or_exit(&json!({
            "kind": "context",
            "canonical": context.canonical(),
            "basecount": context.basecount(),
            "digest": context.digest(),
        }));
    } else {
        println!("{}", context.canonical());
    }
}
