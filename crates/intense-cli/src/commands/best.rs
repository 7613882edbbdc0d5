use crate::support::{parse_context_or_exit, print_json_or_exit, read_json_file_or_exit};
use intense_kernel::{ContextDomain, Limits, Resolution};

pub fn run(
    request: String,
    versions: Vec<String>,
    domain_path: Option<String>,
    limits: &Limits,
    json_output: bool,
) {
    let request = parse_context_or_exit(&request, limits);
    let mut domain = match domain_path.as_deref() {
        Some(path) => read_json_file_or_exit::<ContextDomain>(path, "domain"),
        None => ContextDomain::new(),
    };
    domain.extend(versions.iter().map(|v| parse_context_or_exit(v, limits)));
    tracing::debug!(versions = domain.len(), "domain loaded");

    let resolution = domain.resolve(&request);
    if json_output {
        print_json_or_exit(&resolution);
    } else {
        match &resolution {
            Resolution::Best { context } => println!("best {context}"),
            Resolution::Near { contexts } => {
                for context in contexts {
                    println!("near {context}");
                }
            }
            Resolution::None => println!("none"),
        }
    }

    if resolution == Resolution::None {
        std::process::exit(1);
    }
}
