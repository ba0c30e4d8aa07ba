//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    coldhead::ColdheadCommands, completions::CompletionsArgs, displacer::DisplacerCommands,
    init::InitArgs, order::OrderArgs, search::SearchArgs, test::TestCommands, wip::WipCommands,
};

#[derive(Parser)]
#[command(name = "reptracker")]
#[command(author, version, about = "Coldhead and displacer repair tracker")]
#[command(long_about = "Tracks coldheads and displacers through work-in-progress lots and the test attempts run against them, in a local SQLite database.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Database file (overrides REPTRACKER_DB and config files)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the tracker database (and optionally a config file)
    Init(InitArgs),

    /// Search WIPs by WIP number, serial numbers or test id
    Search(SearchArgs),

    /// Record a new order: WIP, coldhead, displacer and tests in one step
    Order(OrderArgs),

    /// Coldhead management
    #[command(subcommand)]
    Coldhead(ColdheadCommands),

    /// Displacer management
    #[command(subcommand)]
    Displacer(DisplacerCommands),

    /// WIP lot management and placeholder numbers
    #[command(subcommand)]
    Wip(WipCommands),

    /// Test attempt management
    #[command(subcommand)]
    Test(TestCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}
