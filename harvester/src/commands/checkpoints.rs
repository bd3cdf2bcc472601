// harvester/src/commands/checkpoints.rs
//
// USE CASE: Show the last extraction date of every source.

use harvester_core::application::extraction_stats;
use harvester_core::infrastructure::checkpoint::JsonCheckpointStore;
use harvester_core::infrastructure::config::Project;

use crate::output::print_table;

pub fn execute(project: &Project) -> anyhow::Result<()> {
    let config = &project.config;
    let store = JsonCheckpointStore::new(config.extraction.incremental.checkpoint_file.clone());
    println!("📌 Checkpoint file: {}", store.path().display());

    let mut rows = Vec::with_capacity(config.data_sources.len());
    for name in config.data_sources.keys() {
        let stats = extraction_stats(&store, &config.data_sources, name)?;
        rows.push(vec![
            stats.source,
            stats.table,
            if stats.incremental_enabled { "yes" } else { "no" }.to_string(),
            stats
                .last_extraction_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        ]);
    }
    print_table(&["Source", "Table", "Incremental", "Last extraction"], rows);
    Ok(())
}
