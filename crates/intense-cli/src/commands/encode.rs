use crate::support::{parse_context_or_exit, parse_op_or_exit, print_json_or_exit};
use intense_kernel::{Limits, Wire};
use serde_json::json;

pub fn run(text: String, as_op: bool, limits: &Limits, json_output: bool) {
    let (canonical, encoded) = if as_op {
        let op = parse_op_or_exit(&text, limits);
        (op.canonical().to_owned(), op.to_bytes_with(limits))
    } else {
        let context = parse_context_or_exit(&text, limits);
        (context.canonical().to_owned(), context.to_bytes_with(limits))
    };
    let bytes = encoded.unwrap_or_else(|e| {
        eprintln!("error: cannot encode `{canonical}`: {e}");
        std::process::exit(2);
    });

    if json_output {
        print_json_or_exit(&json!({
            "canonical": canonical,
            "length": bytes.len(),
            "hex": hex::encode(&bytes),
        }));
    } else {
        println!("{}", hex::encode(&bytes));
    }
}
