// harvester/src/commands/check.rs
//
// USE CASE: Report on a configuration that loaded cleanly.
// Every load-time rule already ran in `load_project`; this only summarizes.

use harvester_core::infrastructure::config::Project;

use crate::output::print_table;

pub fn execute(project: &Project) {
    let config = &project.config;
    println!("✅ Configuration OK: project '{}'", config.name);

    let rows = config
        .data_sources
        .iter()
        .map(|(name, source)| {
            vec![
                name.clone(),
                source.table.clone(),
                source.incremental.to_string(),
                project.queries.get(name).is_some().to_string(),
                source.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["Source", "Table", "Incremental", "Query", "Description"], rows);

    println!("   Output formats: {}", config.output.formats.join(", "));
    println!(
        "   Incremental extraction: {} (checkpoints in {})",
        config.extraction.incremental.enabled,
        config.extraction.incremental.checkpoint_file.display()
    );
}
