//! Dossier CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `report`: Generate a structured report for a request
//! - `ask`: Answer a question from the documents
//! - `doctor`: Diagnose configuration and backend health

use clap::{Parser, Subcommand};

mod commands;

use commands::report::OutputFormat;

#[derive(Parser)]
#[command(
    name = "dossier",
    about = "Dossier — structured reports from a document collection",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Generate a report
    Report {
        /// What the report should cover
        #[arg(short, long)]
        request: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Write the report here instead of the configured output directory
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Ask a question about the documents
    Ask {
        #[arg(short, long)]
        question: String,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Report {
            request,
            format,
            output,
        } => commands::report::run(&request, format, output).await?,
        Commands::Ask { question } => commands::ask::run(&question).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
