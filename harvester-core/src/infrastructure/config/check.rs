// harvester-core/src/infrastructure/config/check.rs

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use crate::domain::error::DomainError;
use crate::domain::project::{FileNameVars, ProjectConfig, QueryCatalog, QueryVars};
use crate::error::HarvestError;
use crate::infrastructure::compiler::jinja::JinjaRenderer;
use crate::infrastructure::compiler::sql::lint_sql;
use crate::ports::OutputFormat;

/// Cross-document checks run once at load time.
///
/// Field-level rules (ranges, enums) are enforced by deserialization and
/// `validator`; this covers what needs both documents together.
pub fn check_project(config: &ProjectConfig, queries: &QueryCatalog) -> Result<(), HarvestError> {
    check_references(config)?;
    check_templates(config, queries)?;
    check_output(config)?;
    config.schedule.jobs()?;
    Ok(())
}

fn invalid(msg: String) -> HarvestError {
    DomainError::InvalidConfig(msg).into()
}

fn check_references(config: &ProjectConfig) -> Result<(), HarvestError> {
    if let Some(default) = &config.default_database
        && !config.databases.contains_key(default)
    {
        return Err(invalid(format!(
            "default_database '{}' is not declared under 'databases'",
            default
        )));
    }
    if !config.data_sources.is_empty() && config.extraction_database().is_none() {
        return Err(invalid(
            "no database to extract from: declare one under 'databases' or set 'default_database'"
                .to_string(),
        ));
    }

    let mut pairs = HashSet::new();
    for rel in &config.quality_checks.referential_integrity.relationships {
        // Check names are `referential_integrity_<parent>`, unique per child.
        if !pairs.insert((rel.child.as_str(), rel.parent.as_str())) {
            return Err(invalid(format!(
                "relationship {} -> {} is declared more than once",
                rel.child, rel.parent
            )));
        }
        for (role, name) in [("child", &rel.child), ("parent", &rel.parent)] {
            if !config.data_sources.contains_key(name) {
                return Err(invalid(format!(
                    "relationship {} -> {}: {} source '{}' is not declared under 'data_sources'",
                    rel.child, rel.parent, role, name
                )));
            }
        }
    }

    for name in config.schedule.referenced_sources() {
        if !config.data_sources.contains_key(name) {
            return Err(DomainError::UnknownSource(name.to_string()).into());
        }
    }
    Ok(())
}

fn check_templates(config: &ProjectConfig, queries: &QueryCatalog) -> Result<(), HarvestError> {
    let renderer = JinjaRenderer::new();
    let sample_day = NaiveDate::from_ymd_opt(2000, 1, 1);

    for (name, source) in &config.data_sources {
        let template = queries
            .get(name)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DomainError::MissingQueryTemplate(name.clone()))?;

        let vars = QueryVars::new(
            &source.table,
            sample_day,
            sample_day,
            config.extraction.batch_size,
            0,
        )
        .to_json();
        for (kind, sql) in template.all() {
            let rendered = renderer.render_str(sql, &vars)?;
            lint_sql(&format!("{}.{}", name, kind), &rendered)?;
            debug!(source = %name, template = kind, "Query template checked");
        }
    }

    for name in queries.queries.keys() {
        if !config.data_sources.contains_key(name) {
            warn!(source = %name, "Query template has no matching data source and will be ignored");
        }
    }
    Ok(())
}

fn check_output(config: &ProjectConfig) -> Result<(), HarvestError> {
    let renderer = JinjaRenderer::new();
    for format in &config.output.formats {
        let parsed: OutputFormat = format.parse()?;
        let vars = FileNameVars::new("source", Local::now(), parsed.extension()).to_json();
        let name = renderer.render_str(&config.output.naming_pattern, &vars)?;
        if name.trim().is_empty() {
            return Err(invalid("output.naming_pattern renders to an empty file name".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::error::InfrastructureError;

    fn config(yaml: &str) -> ProjectConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn queries(yaml: &str) -> QueryCatalog {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = r#"
databases: { main: { path: db.duckdb } }
data_sources:
  visits: { table: visits, incremental: true }
"#;

    #[test]
    fn test_valid_project_passes() {
        let q = queries("queries: { visits: { full_query: 'SELECT * FROM {{ table }} LIMIT {{ batch_size }} OFFSET {{ batch_offset }}' } }");
        assert!(check_project(&config(BASE), &q).is_ok());
    }

    #[test]
    fn test_source_without_template() {
        let err = check_project(&config(BASE), &queries("queries: {}")).unwrap_err();
        assert!(matches!(err, HarvestError::Domain(DomainError::MissingQueryTemplate(s)) if s == "visits"));
    }

    #[test]
    fn test_template_with_bad_sql() {
        let q = queries("queries: { visits: { query: 'SELEC * FROM {{ table }}' } }");
        let err = check_project(&config(BASE), &q).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Infrastructure(InfrastructureError::SqlSyntax { .. })
        ));
    }

    #[test]
    fn test_template_with_unknown_variable() {
        let q = queries("queries: { visits: { query: 'SELECT * FROM {{ tabel }}' } }");
        let err = check_project(&config(BASE), &q).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Infrastructure(InfrastructureError::Template(_))
        ));
    }

    #[test]
    fn test_relationship_to_unknown_source() {
        let cfg = config(&format!(
            "{}\nquality_checks: {{ referential_integrity: {{ relationships: [{{ child: visits, parent: ghosts, foreign_key: ghost_id }}] }} }}",
            BASE
        ));
        let q = queries("queries: { visits: { query: 'SELECT 1' } }");
        let err = check_project(&cfg, &q).unwrap_err();
        assert!(matches!(err, HarvestError::Domain(DomainError::InvalidConfig(m)) if m.contains("ghosts")));
    }

    #[test]
    fn test_repeated_relationship_is_rejected() {
        let cfg = config(&format!(
            "{}  patients: {{ table: patients }}\nquality_checks: {{ referential_integrity: {{ relationships: [{{ child: visits, parent: patients, foreign_key: patient_id }}, {{ child: visits, parent: patients, foreign_key: referrer_id }}] }} }}",
            BASE
        ));
        let q = queries("queries: { visits: { query: 'SELECT 1' }, patients: { query: 'SELECT 1' } }");
        let err = check_project(&cfg, &q).unwrap_err();
        assert!(matches!(err, HarvestError::Domain(DomainError::InvalidConfig(m)) if m.contains("more than once")));
    }

    #[test]
    fn test_excel_output_is_rejected() {
        let cfg = config(&format!("{}\noutput: {{ formats: [excel] }}", BASE));
        let q = queries("queries: { visits: { query: 'SELECT 1' } }");
        let err = check_project(&cfg, &q).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Infrastructure(InfrastructureError::UnsupportedFormat(_))
        ));
    }
}
