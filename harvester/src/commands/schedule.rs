// harvester/src/commands/schedule.rs
//
// USE CASE: Run the configured jobs until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use harvester_core::application::Scheduler;
use harvester_core::domain::alert::AlertPolicy;
use harvester_core::infrastructure::alert::LogAlertSink;
use harvester_core::infrastructure::config::Project;
use tracing::{info, warn};

use crate::commands::build_pipeline;
use crate::output::print_table;

pub async fn execute(project: &Project, run_immediately: bool) -> anyhow::Result<()> {
    let config = &project.config;
    let jobs = config.schedule.jobs().context("Invalid schedule section")?;

    let now = Local::now().naive_local();
    let rows = jobs
        .iter()
        .map(|job| {
            vec![
                job.kind.to_string(),
                job.time.format("%H:%M").to_string(),
                job.plan
                    .sources
                    .as_ref()
                    .map(|s| s.join(", "))
                    .unwrap_or_else(|| "all".to_string()),
                job.next_occurrence(now)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    println!("⏰ Scheduler for project '{}'", config.name);
    print_table(&["Job", "Time", "Sources", "Next run"], rows);

    let scheduler = Scheduler::new(
        build_pipeline(project)?,
        jobs,
        AlertPolicy::new(config.monitoring.alerts.clone()),
        Arc::new(LogAlertSink::new(config.monitoring.notifications.clone())),
    );

    if run_immediately {
        info!("Running every job once before scheduling");
        scheduler.run_all().await;
    }

    println!("Scheduler started. Press Ctrl-C to stop.");
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;
    println!("👋 Scheduler stopped.");
    Ok(())
}
