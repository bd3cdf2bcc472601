// harvester-core/src/infrastructure/compiler/sql.rs

use crate::infrastructure::error::InfrastructureError;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Parse-only syntax check of rendered SQL. Nothing is executed.
pub fn lint_sql(template_name: &str, sql: &str) -> Result<(), InfrastructureError> {
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql).map_err(|e| InfrastructureError::SqlSyntax {
        template: template_name.to_string(),
        message: e.to_string(),
    })?;
    if statements.len() != 1 {
        return Err(InfrastructureError::SqlSyntax {
            template: template_name.to_string(),
            message: format!("expected exactly one statement, found {}", statements.len()),
        });
    }
    Ok(())
}
