use intense_kernel::text::{parse_compound, parse_context, parse_op};
use intense_kernel::{CompoundDimension, Config, Context, ContextOp, Limits};
use serde::Serialize;
use std::fs;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "INTENSE_LOG";

/// Log to stderr, filtered by `INTENSE_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_limits_or_exit(config_path: &str) -> Limits {
    let config = Config::load(config_path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(2);
    });
    config.limits
}

pub fn parse_context_or_exit(text: &str, limits: &Limits) -> Context {
    parse_context(text, limits).unwrap_or_else(|e| {
        eprintln!("error: invalid context `{text}`: {e}");
        std::process::exit(2);
    })
}

pub fn parse_op_or_exit(text: &str, limits: &Limits) -> ContextOp {
    parse_op(text, limits).unwrap_or_else(|e| {
        eprintln!("error: invalid op `{text}`: {e}");
        std::process::exit(2);
    })
}

pub fn parse_path_or_exit(text: &str) -> CompoundDimension {
    parse_compound(text).unwrap_or_else(|e| {
        eprintln!("error: invalid path `{text}`: {e}");
        std::process::exit(2);
    })
}

pub fn read_json_file_or_exit<T>(path: &str, label: &str) -> T
where
    T: serde::de::DeserializeOwned,
{
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {label} at {path}: {e}");
        std::process::exit(2);
    });
    serde_json::from_slice::<T>(&bytes).unwrap_or_else(|e| {
        eprintln!("error: failed to parse {label} JSON at {path}: {e}");
        std::process::exit(2);
    })
}

pub fn print_json_or_exit(payload: &impl Serialize) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|e| {
        eprintln!("error: failed to render JSON payload: {e}");
        std::process::exit(2);
    });
    println!("{rendered}");
}
