// harvester/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Scheduled extraction, validation and load for facility data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(
        long,
        global = true,
        ignore_case = true,
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project config file, or a directory holding harvester.yaml
    #[arg(long, default_value = ".", env = "HARVESTER_CONFIG")]
    pub config: PathBuf,

    /// Query templates file (defaults to queries.yaml next to the config)
    #[arg(long, env = "HARVESTER_QUERIES")]
    pub queries: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Sources to extract (space-separated). Use "all" for every source.
    #[arg(long, num_args = 1.., default_value = "all")]
    pub sources: Vec<String>,

    /// Start date for extraction (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// End date for extraction (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Full extraction instead of incremental
    #[arg(long)]
    pub full: bool,

    /// Extract the last N days (overrides --start-date and --end-date)
    #[arg(long)]
    pub last_n_days: Option<u64>,

    /// Stop before transform and load on critical validation failures
    #[arg(long)]
    pub stop_on_validation_failure: bool,
}

impl RunArgs {
    /// `None` when every source is selected.
    pub fn selected_sources(&self) -> Option<Vec<String>> {
        if self.sources.iter().any(|s| s.eq_ignore_ascii_case("all")) {
            None
        } else {
            Some(self.sources.clone())
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Runs the ETL pipeline once (extract -> validate -> transform -> load)
    Run(RunArgs),

    /// ⏰ Runs the configured daily/weekly/monthly jobs until interrupted
    Schedule {
        #[command(flatten)]
        project: ProjectArgs,

        /// Run every enabled job once at startup
        #[arg(long)]
        run_immediately: bool,
    },

    /// 📌 Shows extraction checkpoints per source
    Checkpoints {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// ✅ Loads and checks the configuration without touching any database
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },
}
