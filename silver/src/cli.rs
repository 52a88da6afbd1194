// silver/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "silver")]
#[command(about = "Bronze-to-silver cleansing and full-refresh load engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project directory
    #[arg(long, global = true, default_value = ".", env = "SILVER_PROJECT_DIR")]
    pub project_dir: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🏗️  Creates the bronze/silver schemas and the silver tables
    Init,

    /// 📥 Loads the CSV sources into the bronze tables
    Ingest,

    /// 🚀 Full refresh: bronze -> rules -> silver, entity by entity
    Run {
        /// Reference date for "in the future" rules (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// ✅ Runs the quality suite against the silver tables
    Check {
        /// Exit with an error when any check finds violations
        #[arg(long)]
        strict: bool,
    },

    /// 🔍 Inspects a warehouse table (schema + sample rows)
    Inspect {
        /// Table to inspect, `schema.table` or a silver table name
        #[arg(long, short)]
        table: String,

        /// Number of sample rows to display
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// 🧹 Cleans build artifacts (target/ folder)
    Clean,
}
