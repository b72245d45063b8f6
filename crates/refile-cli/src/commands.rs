use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "refile")]
#[command(about = "Classify files and reorganize them into a category hierarchy", long_about = None)]
pub struct Cli {
    /// Reorganization config (TOML, JSON or YAML). Defaults to ./Refile.* or built-in rules
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Categories document with purpose categories and version types
    #[arg(long, global = true)]
    pub categories: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify every file in a directory
    Analyze {
        dir: PathBuf,
        /// Write one <name>_analysis.json per file here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List pairs of similar text files
    Similar {
        dir: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Group near-duplicate files and propose version names
    Versions {
        dir: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Preview the reorganization of a directory
    Plan {
        dir: PathBuf,
        /// Base of the category folders; defaults to the scanned directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Move files into category folders under OUT
    Apply {
        dir: PathBuf,
        out: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Undo the last apply into OUT
    Rollback { out: PathBuf },
    /// Print configuration values
    PrintConfig,
}
