use crate::support::{
    parse_context_or_exit, parse_op_or_exit, parse_path_or_exit, print_json_or_exit,
};
use intense_kernel::Limits;
use serde_json::json;

pub fn run(context: String, op: String, at: Option<String>, limits: &Limits, json_output: bool) {
    let mut target = parse_context_or_exit(&context, limits);
    let op = parse_op_or_exit(&op, limits);
    match at.as_deref() {
        Some(path) => target.apply_at(&parse_path_or_exit(path), &op),
        None => target.apply(&op),
    };

    if json_output {
        print_json_or_exit(&json!({
            "input": context,
            "op": op.canonical(),
            "at": at,
            "result": target.canonical(),
            "basecount": target.basecount(),
        }));
    } else {
        println!("{}", target.canonical());
    }
}
