pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Portal CLI - inspect schema descriptors and maintain the audit trail")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List and validate schema descriptors")]
    Schemas {
        #[command(subcommand)]
        cmd: commands::schemas::SchemaCommands,
    },

    #[command(about = "Audit trail maintenance")]
    Audit {
        #[command(subcommand)]
        cmd: commands::audit::AuditCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Schemas { cmd } => commands::schemas::handle(cmd, output_format).await,
        Commands::Audit { cmd } => commands::audit::handle(cmd, output_format).await,
    }
}
