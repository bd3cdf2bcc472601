// harvester-core/src/infrastructure/config/queries.rs

use std::fs;
use std::path::Path;
use tracing::{info, instrument};

use crate::domain::project::QueryCatalog;
use crate::infrastructure::config::env::substitute_env;
use crate::infrastructure::error::InfrastructureError;

#[instrument]
pub fn load_queries(path: &Path) -> Result<QueryCatalog, InfrastructureError> {
    if !path.exists() {
        return Err(InfrastructureError::ConfigNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let catalog: QueryCatalog = serde_yaml::from_str(&substitute_env(&content))?;
    info!(sources = catalog.queries.len(), "Query templates loaded");
    Ok(catalog)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_loads_catalog() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("queries.yaml");
        fs::write(
            &path,
            r#"
queries:
  visits:
    incremental_query: "SELECT * FROM visits WHERE visit_date >= '{{ start_date }}' LIMIT {{ batch_size }} OFFSET {{ batch_offset }}"
  facilities:
    query: "SELECT * FROM facilities"
"#,
        )?;
        let catalog = load_queries(&path)?;
        assert!(catalog.get("visits").unwrap().incremental_query.is_some());
        assert_eq!(catalog.get("facilities").unwrap().reference(), Some("SELECT * FROM facilities"));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = load_queries(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, InfrastructureError::ConfigNotFound(_)));
    }
}
