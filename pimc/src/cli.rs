//! Command-line surface: a single positional argument naming the YAML
//! configuration file.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "pimc", about = "PIM-SM v2 Join/Prune emitter", version)]
pub struct Cli {
    /// Path to the YAML configuration file.
    pub config: PathBuf,
}
