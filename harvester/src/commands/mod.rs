// harvester/src/commands/mod.rs
//
// One file per subcommand, plus the adapter wiring they share.

pub mod check;
pub mod checkpoints;
pub mod run;
pub mod schedule;

use std::sync::Arc;

use anyhow::Context;
use harvester_core::application::{BatchExtractor, EtlPipeline, OutputStage};
use harvester_core::infrastructure::adapters::{DuckDbSource, DuckDbWriter};
use harvester_core::infrastructure::checkpoint::JsonCheckpointStore;
use harvester_core::infrastructure::compiler::jinja::JinjaRenderer;
use harvester_core::infrastructure::config::{Project, load_project};

use crate::cli::ProjectArgs;

pub fn load(args: &ProjectArgs) -> anyhow::Result<Project> {
    load_project(&args.config, args.queries.as_deref())
        .with_context(|| format!("Failed to load project configuration from {:?}", args.config))
}

/// Wires the DuckDB source, JSON checkpoints and output writer into a pipeline.
pub fn build_pipeline(project: &Project) -> anyhow::Result<EtlPipeline> {
    let config = &project.config;

    let (db_name, db) = config
        .extraction_database()
        .context("No extraction database configured (set 'default_database')")?;
    let source = DuckDbSource::from_config(db)
        .with_context(|| format!("Failed to open database '{}' at {}", db_name, db.path.display()))?;

    let checkpoints = Arc::new(JsonCheckpointStore::new(
        config.extraction.incremental.checkpoint_file.clone(),
    ));
    let templates = Arc::new(JinjaRenderer::new());

    let extractor = BatchExtractor::new(
        config,
        project.queries.clone(),
        Arc::new(source),
        checkpoints,
        templates.clone(),
    );

    let writer = Arc::new(DuckDbWriter::new(config.output.compression.clone()));
    let output = OutputStage::from_config(&config.output, writer, templates)?;

    Ok(EtlPipeline::new(config, extractor, output))
}
