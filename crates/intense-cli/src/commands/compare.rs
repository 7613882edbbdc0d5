use crate::support::{parse_context_or_exit, print_json_or_exit};
use intense_kernel::Limits;
use serde_json::json;
use std::cmp::Ordering;

pub fn run(left: String, right: String, limits: &Limits, json_output: bool) {
    let left = parse_context_or_exit(&left, limits);
    let right = parse_context_or_exit(&right, limits);
    let ordering = match left.compare(&right) {
        Ordering::Less => "less",
        Ordering::Equal => "equal",
        Ordering::Greater => "greater",
    };

    if json_output {
        print_json_or_exit(&json!({
            "left": left.canonical(),
            "right": right.canonical(),
            "ordering": ordering,
            "left_refines_right": left.refines_to(&right),
            "right_refines_left": right.refines_to(&left),
        }));
    } else {
        println!("{ordering}");
    }
}
