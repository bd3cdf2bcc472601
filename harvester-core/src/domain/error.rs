// harvester-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Unknown data source: {0}")]
    #[diagnostic(
        code(harvester::domain::unknown_source),
        help("Declare the source under 'data_sources' in the project config.")
    )]
    UnknownSource(String),

    #[error("No query template found for source: {0}")]
    #[diagnostic(
        code(harvester::domain::missing_query),
        help("Add an 'incremental_query', 'full_query' or 'query' entry in queries.yaml.")
    )]
    MissingQueryTemplate(String),

    #[error("Critical validation failures detected for {source_name}: {failed_checks:?}. Pipeline stopped.")]
    #[diagnostic(code(harvester::domain::critical_validation))]
    CriticalValidationFailure {
        source_name: String,
        failed_checks: Vec<String>,
    },

    #[error(
        "Source '{source_name}' returned {returned} rows for a page of {limit} at offset {offset}"
    )]
    #[diagnostic(
        code(harvester::domain::page_overflow),
        help("Paged query templates must apply LIMIT {{ batch_size }} OFFSET {{ batch_offset }}.")
    )]
    PageOverflow {
        source_name: String,
        offset: usize,
        limit: usize,
        returned: usize,
    },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(harvester::domain::invalid_config))]
    InvalidConfig(String),

    #[error("Columns '{first}' and '{second}' both become '{column}'")]
    #[diagnostic(
        code(harvester::domain::column_collision),
        help("Alias one of the columns in the query template.")
    )]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },

    #[error("Illegal pipeline transition: {from} -> {to}")]
    #[diagnostic(code(harvester::domain::state))]
    IllegalTransition { from: String, to: String },
}
