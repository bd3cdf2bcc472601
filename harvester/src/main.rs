// harvester/src/main.rs

mod cli;
mod commands;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        // --- USE CASE: RUN PIPELINE ---
        Commands::Run(args) => {
            let project = commands::load(&args.project)?;
            let _guard = logging::init(&project.config.logging, log_level)?;
            commands::run::execute(&project, &args).await
        }

        // --- USE CASE: SCHEDULED JOBS ---
        Commands::Schedule {
            project,
            run_immediately,
        } => {
            let project = commands::load(&project)?;
            let _guard = logging::init(&project.config.logging, log_level)?;
            commands::schedule::execute(&project, run_immediately).await?;
            Ok(ExitCode::SUCCESS)
        }

        // --- USE CASE: CHECKPOINT INSPECTION ---
        Commands::Checkpoints { project } => {
            let project = commands::load(&project)?;
            commands::checkpoints::execute(&project)?;
            Ok(ExitCode::SUCCESS)
        }

        // --- USE CASE: CONFIG CHECK ---
        Commands::Check { project: args } => {
            let project = commands::load(&args)?;
            commands::check::execute(&project);
            Ok(ExitCode::SUCCESS)
        }
    }
}
