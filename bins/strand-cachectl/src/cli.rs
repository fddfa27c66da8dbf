// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "strand-cachectl", author, version, about, long_about = None)]
pub struct Cli {
    /// Plan store root (default: $STRAND_PLAN_CACHE_DIR, else the platform cache dir)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarise the store: entry count, sizes, epochs
    Stats,
    /// List stored entries
    List,
    /// Show the graph key and node keys of one entry
    Inspect {
        /// Entry digest or a unique prefix of it
        digest: String,
        /// Also dump the raw key and value as hex
        #[arg(long)]
        raw: bool,
    },
    /// Remove every stored entry
    Clear {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
