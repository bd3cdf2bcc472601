// harvester-core/src/domain/validation/checks/nulls.rs

use serde_json::json;

use crate::domain::dataset::Dataset;
use crate::domain::validation::report::{CheckKind, ValidationResult, round2};
use crate::domain::validation::rules::NullCheckRule;

/// Columns listed in the rule but absent from the dataset are skipped, not failed.
pub fn check_null_values(data: &Dataset, rule: &NullCheckRule) -> ValidationResult {
    let row_count = data.row_count();
    let mut issues = Vec::new();

    for column in rule.critical_columns.iter().filter(|c| data.has_column(c)) {
        let null_count = data.null_count(column);
        let null_percentage = if row_count == 0 {
            0.0
        } else {
            null_count as f64 / row_count as f64 * 100.0
        };

        if null_percentage > rule.max_null_percentage {
            issues.push(json!({
                "column": column,
                "null_count": null_count,
                "null_percentage": round2(null_percentage),
            }));
        }
    }

    if issues.is_empty() {
        ValidationResult::pass(
            CheckKind::NullValues,
            "All critical columns meet null value thresholds",
            json!({
                "critical_columns": rule.critical_columns,
                "max_null_percentage": rule.max_null_percentage,
            }),
        )
    } else {
        ValidationResult::fail(
            CheckKind::NullValues,
            format!(
                "Found {} columns exceeding null value threshold",
                issues.len()
            ),
            json!({
                "issues": issues,
                "max_null_percentage": rule.max_null_percentage,
                "row_count": row_count,
            }),
        )
    }
}
