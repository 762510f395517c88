pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "usage-metrics")]
#[command(about = "Tenant usage metrics - refresh and inspect metrics from tenant databases")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, conflicts_with = "json", help = "Output in human-readable text format (default)")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Refresh total and paid users for one tenant")]
    Refresh(commands::refresh::RefreshArgs),

    #[command(about = "Refresh every tenant in sequential batches")]
    RefreshAll(commands::refresh::RefreshAllArgs),

    #[command(about = "Record a full metric snapshot for one tenant")]
    Snapshot(commands::refresh::SnapshotArgs),

    #[command(about = "Show discovered schema and all metrics for a database URL")]
    Inspect(commands::inspect::InspectArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json && !cli.text {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Refresh(args) => commands::refresh::handle_refresh(args, output_format).await,
        Commands::RefreshAll(args) => commands::refresh::handle_refresh_all(args, output_format).await,
        Commands::Snapshot(args) => commands::refresh::handle_snapshot(args, output_format).await,
        Commands::Inspect(args) => commands::inspect::handle(args, output_format).await,
    }
}
