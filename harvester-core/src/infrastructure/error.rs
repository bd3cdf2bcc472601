// harvester-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(harvester::infra::database::duckdb),
        help("An error occurred inside the SQL engine.")
    )]
    DuckDB(#[from] duckdb::Error),

    #[error("Database connection lock poisoned")]
    #[diagnostic(code(harvester::infra::database::poisoned))]
    Poisoned,
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(harvester::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML / JSON ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(harvester::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(harvester::infra::json))]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(harvester::infra::config))]
    ConfigError(String),

    #[error("Configuration not found at '{0}'")]
    #[diagnostic(code(harvester::infra::config_missing))]
    ConfigNotFound(String),

    #[error("Configuration rejected: {0}")]
    #[diagnostic(
        code(harvester::infra::config_rules),
        help("A value is outside its allowed range.")
    )]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unsupported database type '{0}'")]
    #[diagnostic(
        code(harvester::infra::database_type),
        help("Only 'duckdb' databases are supported.")
    )]
    UnsupportedDatabase(String),

    #[error("Unsupported output format '{0}'")]
    #[diagnostic(
        code(harvester::infra::format),
        help("Supported formats: parquet, csv, json.")
    )]
    UnsupportedFormat(String),

    // --- TEMPLATING / SQL ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(harvester::infra::template),
        help("Check your Jinja syntax ({{ ... }}) inside the query template.")
    )]
    Template(#[from] minijinja::Error),

    #[error("SQL syntax error in template '{template}': {message}")]
    #[diagnostic(code(harvester::infra::sql_syntax))]
    SqlSyntax { template: String, message: String },
}

impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}
