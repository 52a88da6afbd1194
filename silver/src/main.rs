// silver/src/main.rs

mod cli;
mod commands;
mod logging;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug silver run ... pour voir les détails
    logging::init(cli.log_format);

    let project_dir = cli.project_dir.as_path();
    match cli.command {
        // --- USE CASE: PROVISION ---
        Commands::Init => commands::init::execute(project_dir).await,

        // --- USE CASE: BRONZE INGESTION ---
        Commands::Ingest => commands::ingest::execute(project_dir).await,

        // --- USE CASE: FULL REFRESH ---
        Commands::Run { as_of } => commands::run::execute(project_dir, as_of).await,

        // --- USE CASE: QUALITY SUITE ---
        Commands::Check { strict } => commands::check::execute(project_dir, strict).await,

        // --- USE CASE: INSPECT ---
        Commands::Inspect { table, limit } => {
            commands::inspect::execute(project_dir, table, limit).await
        }

        // --- USE CASE: CLEAN ---
        Commands::Clean => commands::clean::execute(project_dir),
    }
}
