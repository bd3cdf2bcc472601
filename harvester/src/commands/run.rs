// harvester/src/commands/run.rs
//
// USE CASE: Run the ETL pipeline once.

use std::process::ExitCode;

use chrono::{Days, Local, NaiveDate};
use harvester_core::application::RunRequest;
use harvester_core::domain::pipeline::RunSummary;
use harvester_core::domain::project::PipelineConfig;
use harvester_core::infrastructure::config::Project;

use crate::cli::RunArgs;
use crate::commands::build_pipeline;
use crate::output::print_table;

pub async fn execute(project: &Project, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let start = std::time::Instant::now();
    let request = build_request(args, &project.config.pipeline, Local::now().date_naive());

    println!("⚙️  Project: {}", project.config.name);
    println!(
        "   Sources: {}",
        request
            .sources
            .as_ref()
            .map(|s| s.join(", "))
            .unwrap_or_else(|| "all".to_string())
    );
    println!(
        "   Window: {} -> {}",
        date_or(request.start_date, "checkpoint"),
        date_or(request.end_date, "today")
    );
    println!("   Incremental: {}", request.incremental);

    let pipeline = build_pipeline(project)?;

    match pipeline.run(&request).await {
        Ok(summary) => {
            print_summary(&summary);
            println!(
                "\n✨ SUCCESS! Pipeline finished in {:.2?}. Summary: {}",
                start.elapsed(),
                pipeline.summary_path(&summary.run_id).display()
            );
            println!(
                "   Metrics: {}",
                pipeline.metrics_path(&summary.run_id).display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("\n💥 PIPELINE FAILED: {}", e);
            eprintln!(
                "   Run summary written under {}",
                project.config.output.paths.results.display()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Merges CLI flags with the `pipeline` section. `--last-n-days` wins over explicit dates.
fn build_request(args: &RunArgs, pipeline: &PipelineConfig, today: NaiveDate) -> RunRequest {
    let mut request = RunRequest::from_config(pipeline);
    request.sources = args.selected_sources();
    request.incremental = !args.full;
    request.stop_on_validation_failure |= args.stop_on_validation_failure;

    match args.last_n_days {
        Some(days) => {
            request.start_date = today.checked_sub_days(Days::new(days));
            request.end_date = Some(today);
        }
        None => {
            request.start_date = args.start_date;
            request.end_date = args.end_date;
        }
    }
    request
}

fn date_or(date: Option<NaiveDate>, fallback: &str) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| fallback.to_string())
}

fn print_summary(summary: &RunSummary) {
    println!("\nRun {} ({:.2}s)", summary.run_id, summary.duration_seconds);

    let rows = summary
        .rows_extracted
        .iter()
        .map(|(source, rows)| {
            let checks = summary
                .validation_summary
                .get(source)
                .map(|v| format!("{}/{} ({:.1}%)", v.passed, v.total, v.success_rate))
                .unwrap_or_else(|| "-".to_string());
            let status = match summary.extraction_errors.get(source) {
                Some(err) => format!("error: {}", err),
                None => "ok".to_string(),
            };
            let files = summary.output_paths.get(source).map_or(0, Vec::len);
            vec![
                source.clone(),
                rows.to_string(),
                checks,
                files.to_string(),
                status,
            ]
        })
        .collect();
    print_table(&["Source", "Rows", "Checks passed", "Files", "Extraction"], rows);

    println!(
        "Total: {} rows extracted, {} rows loaded",
        summary.total_rows_extracted, summary.total_rows_loaded
    );
}
