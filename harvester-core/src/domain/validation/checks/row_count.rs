// harvester-core/src/domain/validation/checks/row_count.rs

use serde_json::json;

use crate::domain::dataset::Dataset;
use crate::domain::validation::report::{CheckKind, ValidationResult};
use crate::domain::validation::rules::RowCountRule;

pub fn check_row_count(data: &Dataset, rule: &RowCountRule) -> ValidationResult {
    let row_count = data.row_count();
    let details = json!({ "row_count": row_count, "min_required": rule.min_rows });

    if row_count >= rule.min_rows {
        ValidationResult::pass(
            CheckKind::RowCount,
            format!(
                "Row count {} meets minimum threshold {}",
                row_count, rule.min_rows
            ),
            details,
        )
    } else {
        ValidationResult::fail(
            CheckKind::RowCount,
            format!(
                "Row count {} below minimum threshold {}",
                row_count, rule.min_rows
            ),
            details,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;

    fn rows(n: usize) -> Dataset {
        Dataset::new(
            vec!["id".into()],
            (0..n).map(|i| vec![Value::Integer(i as i64)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_boundary_exactly_min_passes() {
        let rule = RowCountRule::default();
        assert!(check_row_count(&rows(100), &rule).passed);
    }

    #[test]
    fn test_one_below_min_fails_with_count() {
        let rule = RowCountRule::default();
        let res = check_row_count(&rows(99), &rule);
        assert!(!res.passed);
        assert_eq!(res.detail("row_count"), Some(&json!(99)));
        assert_eq!(res.detail("min_required"), Some(&json!(100)));
    }
}
