use clap::{Parser, Subcommand};

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "sysmend")]
#[command(about = "File-system integrity scanner and repair orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the configured roots against the baseline and report issues
    Scan,
    /// Scan, then plan and apply repairs for every issue found
    Repair,
    /// Print configuration values
    PrintConfig,
}
