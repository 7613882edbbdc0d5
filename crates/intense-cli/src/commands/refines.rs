use crate::support::{parse_context_or_exit, print_json_or_exit};
use intense_kernel::Limits;
use serde_json::json;

pub fn run(context: String, target: String, limits: &Limits, json_output: bool) {
    let context = parse_context_or_exit(&context, limits);
    let target = parse_context_or_exit(&target, limits);
    let refines = context.refines_to(&target);

    if json_output {
        print_json_or_exit(&json!({
            "context": context.canonical(),
            "target": target.canonical(),
            "refines": refines,
        }));
    } else {
        println!("{}", if refines { "yes" } else { "no" });
    }

    if !refines {
        std::process::exit(1);
    }
}
