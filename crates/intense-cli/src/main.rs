//! Intense CLI: the `intense` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_logging();
    let limits = support::load_limits_or_exit(&cli.config);

    match cli.command {
        Commands::Canonical { text, op, json } => commands::canonical::run(text, op, &limits, json),

        Commands::Apply {
            context,
            op,
            at,
            json,
        } => commands::apply::run(context, op, at, &limits, json),

        Commands::Compose {
            first,
            second,
            json,
        } => commands::compose::run(first, second, &limits, json),

        Commands::Compare { left, right, json } => {
            commands::compare::run(left, right, &limits, json)
        }

        Commands::Refines {
            context,
            target,
            json,
        } => commands::refines::run(context, target, &limits, json),

        Commands::Best {
            request,
            versions,
            domain,
            json,
        } => commands::best::run(request, versions, domain, &limits, json),

        Commands::Encode { text, op, json } => commands::encode::run(text, op, &limits, json),

        Commands::Decode { hex, op, json } => commands::decode::run(hex, op, &limits, json),
    }
}
