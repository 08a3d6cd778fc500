// src/cli/args.rs

use clap::Parser;
use std::path::PathBuf;

/// keydeck: an interactive terminal menu that maps single keystrokes to
/// configured actions.
///
/// Without flags, keydeck discovers a configuration file (`keydeck.toml`,
/// `.keydeck.toml` or `.keydeck/keydeck.toml`, walking up from the current
/// directory), builds the menu tree from it and enters the interactive loop.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Use an explicit configuration file instead of discovering one.
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Scaffold a starter configuration file and exit. FORMAT is `toml`
    /// (default) or `json`.
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "toml")]
    pub init: Option<String>,
}
