use crate::support::print_json_or_exit;
use intense_kernel::{Context, ContextOp, Limits, Wire};
use serde_json::json;

pub fn run(input: String, as_op: bool, limits: &Limits, json_output: bool) {
    let bytes = hex::decode(input.trim()).unwrap_or_else(|e| {
        eprintln!("error: input is not hex: {e}");
        std::process::exit(2);
    });
    let decoded = if as_op {
        ContextOp::from_bytes_with(&bytes, limits, None).map(|op| op.canonical().to_owned())
    } else {
        Context::from_bytes_with(&bytes, limits, None).map(|c| c.canonical().to_owned())
    };
    let canonical = decoded.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(2);
    });

    if json_output {
        print_json_or_exit(&json!({
            "kind": if as_op { "op" } else { "context" },
            "length": bytes.len(),
            "canonical": canonical,
        }));
    } else {
        println!("{canonical}");
    }
}
