use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "promptdock", about = "Prompt library engine for AI chat pages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a JSON event trace against a page fixture
    Replay {
        /// Page fixture file
        page: PathBuf,

        /// Milliseconds until the simulated host runtime reports ready
        #[arg(long)]
        runtime_delay_ms: Option<u64>,

        /// Print the final page state once the trace ends
        #[arg(long)]
        dump: bool,
    },

    /// Resolve a host (with optional path) to its platform rule
    Resolve {
        /// Host plus optional path, e.g. chatgpt.com or x.com/i/grok
        host_path: String,
    },

    /// List the built-in platform rules
    Platforms,

    /// Summarize an exported prompt library snapshot
    Library {
        /// Snapshot file: one JSON object of storage keys
        file: PathBuf,

        /// Re-encode through the typed codecs and print the canonical
        /// snapshot instead of a summary
        #[arg(long)]
        normalize: bool,
    },
}
