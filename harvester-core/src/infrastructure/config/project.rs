// harvester-core/src/infrastructure/config/project.rs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::project::{ProjectConfig, QueryCatalog};
use crate::error::HarvestError;
use crate::infrastructure::config::check::check_project;
use crate::infrastructure::config::env::substitute_env;
use crate::infrastructure::config::queries::load_queries;
use crate::infrastructure::error::InfrastructureError;

const CONFIG_CANDIDATES: [&str; 3] = ["harvester.yaml", "harvester.yml", "config/harvester.yaml"];
const QUERIES_CANDIDATES: [&str; 3] = ["queries.yaml", "queries.yml", "config/queries.yaml"];

/// A loaded and checked project: settings plus query templates.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ProjectConfig,
    pub queries: QueryCatalog,
}

/// Loads both documents and runs every load-time check.
///
/// `queries_path` defaults to a `queries.yaml` next to the config file.
#[instrument]
pub fn load_project(config_path: &Path, queries_path: Option<&Path>) -> Result<Project, HarvestError> {
    let config_file = resolve(config_path, &CONFIG_CANDIDATES)?;
    let config = load_project_config(&config_file)?;

    let queries_file = match queries_path {
        Some(p) => resolve(p, &QUERIES_CANDIDATES)?,
        None => {
            let dir = config_file.parent().unwrap_or_else(|| Path::new("."));
            resolve(dir, &QUERIES_CANDIDATES)?
        }
    };
    let queries = load_queries(&queries_file)?;

    check_project(&config, &queries)?;
    Ok(Project { config, queries })
}

/// Reads `harvester.yaml`: env substitution, parsing, overrides, field rules.
#[instrument]
pub fn load_project_config(path: &Path) -> Result<ProjectConfig, InfrastructureError> {
    let path = resolve(path, &CONFIG_CANDIDATES)?;
    info!(path = ?path, "Loading project config");

    let content = fs::read_to_string(&path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&substitute_env(&content))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    for (name, db) in &config.databases {
        if !db.kind.eq_ignore_ascii_case("duckdb") {
            return Err(InfrastructureError::UnsupportedDatabase(format!(
                "{} (database '{}')",
                db.kind, name
            )));
        }
    }

    Ok(config)
}

/// A file is used as is; a directory is searched for the first known file name.
fn resolve(path: &Path, candidates: &[&str]) -> Result<PathBuf, InfrastructureError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        for filename in candidates {
            let p = path.join(filename);
            if p.exists() {
                return Ok(p);
            }
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "{} (checked: {:?})",
        path.display(),
        candidates
    )))
}

pub(crate) fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("HARVESTER_CHECKPOINT_FILE") {
        info!(old = ?config.extraction.incremental.checkpoint_file, new = ?val, "Overriding checkpoint file via ENV");
        config.extraction.incremental.checkpoint_file = PathBuf::from(val);
    }
    if let Some(val) = lookup("HARVESTER_RESULTS_DIR") {
        info!(old = ?config.output.paths.results, new = ?val, "Overriding results directory via ENV");
        config.output.paths.results = PathBuf::from(val);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
name: facility
databases:
  warehouse: { type: duckdb, path: warehouse.duckdb }
data_sources:
  visits: { table: visits, incremental: true, primary_key: visit_id, date_column: visit_date }
  patients: { table: patients, primary_key: patient_id }
quality_checks:
  referential_integrity:
    relationships:
      - { child: visits, parent: patients, foreign_key: patient_id }
"#;

    const QUERIES: &str = r#"
queries:
  visits:
    incremental_query: "SELECT * FROM {{ table }} WHERE visit_date >= '{{ start_date }}' LIMIT {{ batch_size }} OFFSET {{ batch_offset }}"
    full_query: "SELECT * FROM {{ table }} LIMIT {{ batch_size }} OFFSET {{ batch_offset }}"
  patients:
    query: "SELECT * FROM {{ table }}"
"#;

    #[test]
    fn test_loads_project_from_directory() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("harvester.yaml"), CONFIG)?;
        fs::write(dir.path().join("queries.yaml"), QUERIES)?;

        let project = load_project(dir.path(), None)?;
        assert_eq!(project.config.name, "facility");
        assert_eq!(project.queries.queries.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unsupported_database_type() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("harvester.yaml");
        fs::write(&path, "databases: { main: { type: postgresql, path: x } }")?;
        let err = load_project_config(&path).unwrap_err();
        assert!(matches!(err, InfrastructureError::UnsupportedDatabase(_)));
        Ok(())
    }

    #[test]
    fn test_field_rules_are_enforced() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("harvester.yaml");
        fs::write(&path, "quality_checks: { null_checks: { max_null_percentage: 150 } }")?;
        let err = load_project_config(&path).unwrap_err();
        assert!(matches!(err, InfrastructureError::Validation(_)));
        Ok(())
    }

    #[test]
    fn test_missing_config() {
        let dir = tempdir().unwrap();
        let err = load_project_config(dir.path()).unwrap_err();
        assert!(matches!(err, InfrastructureError::ConfigNotFound(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg: ProjectConfig = serde_yaml::from_str("{}").unwrap();
        apply_env_overrides(&mut cfg, |key| match key {
            "HARVESTER_CHECKPOINT_FILE" => Some("/tmp/cp.json".into()),
            _ => None,
        });
        assert_eq!(cfg.extraction.incremental.checkpoint_file, PathBuf::from("/tmp/cp.json"));
        assert_eq!(cfg.output.paths.results, PathBuf::from("results/metrics"));
    }
}
