use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "intense",
    about = "Intense: canonicalize, patch, order, and resolve intensional contexts",
    version
)]
pub struct Cli {
    /// Limits configuration file (TOML); missing file means defaults
    #[arg(long, global = true, default_value = "intense.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a context (or op) and print its canonical text
    Canonical {
        /// Context text, e.g. `<lang:<"fr">>`
        text: String,

        /// Parse the text as an op instead of a context
        #[arg(long)]
        op: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply an op to a context
    Apply {
        /// Context text
        context: String,

        /// Op text, e.g. `[--+d:[1]]`
        op: String,

        /// Apply at this path instead of the root, e.g. `a:b`
        #[arg(long)]
        at: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compose two ops; applying the result equals applying both in order
    Compose {
        /// First op
        first: String,

        /// Second op
        second: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two contexts in the total order
    Compare {
        left: String,

        right: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a context refines to another: everything it defines is
    /// matched by the target (exits 1 when it does not)
    Refines {
        context: String,

        target: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a request against a set of versions (exits 1 when nothing fits)
    Best {
        /// Requested context
        request: String,

        /// Candidate version (repeatable)
        #[arg(long = "candidate", value_name = "CONTEXT")]
        versions: Vec<String>,

        /// JSON file holding an array of context strings
        #[arg(long)]
        domain: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode a context (or op) in the binary wire form, printed as hex
    Encode {
        text: String,

        /// Encode an op instead of a context
        #[arg(long)]
        op: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode hex wire bytes into a context (or op)
    Decode {
        hex: String,

        /// Decode an op instead of a context
        #[arg(long)]
        op: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
