// harvester-core/src/domain/validation/checks/types.rs

use serde_json::json;

use crate::domain::dataset::Dataset;
use crate::domain::validation::report::{CheckKind, ValidationResult};

const NUMERIC_INDICATORS: [&str; 7] = ["id", "count", "amount", "cost", "charge", "minutes", "duration"];
const NON_NEGATIVE_INDICATORS: [&str; 4] = ["count", "duration", "minutes", "age"];

fn name_matches(column: &str, indicators: &[&str]) -> bool {
    let lower = column.to_lowercase();
    indicators.iter().any(|i| lower.contains(i))
}

/// Columns named like numbers must hold numbers (or nulls).
pub fn check_data_types(data: &Dataset) -> ValidationResult {
    let mut issues = Vec::new();

    for column in data.columns().iter().filter(|c| name_matches(c, &NUMERIC_INDICATORS)) {
        let actual = data.column_type(column);
        if actual.is_numeric() {
            continue;
        }
        let non_numeric = data
            .column_values(column)
            .filter(|v| !v.is_null() && !v.is_numeric())
            .count();
        if non_numeric > 0 {
            issues.push(json!({
                "column": column,
                "expected_type": "numeric",
                "actual_type": actual,
                "non_numeric_count": non_numeric,
            }));
        }
    }

    if issues.is_empty() {
        ValidationResult::pass(CheckKind::DataTypes, "All columns have expected data types", json!({}))
    } else {
        ValidationResult::fail(
            CheckKind::DataTypes,
            format!("Found {} data type issues", issues.len()),
            json!({ "issues": issues }),
        )
    }
}

/// Counts, durations and ages cannot be negative.
pub fn check_value_ranges(data: &Dataset) -> ValidationResult {
    let mut issues = Vec::new();

    for column in data.columns().iter().filter(|c| name_matches(c, &NON_NEGATIVE_INDICATORS)) {
        if !data.column_type(column).is_numeric() {
            continue;
        }
        let numbers: Vec<f64> = data.column_values(column).filter_map(|v| v.as_f64()).collect();
        let negative = numbers.iter().filter(|n| **n < 0.0).count();
        if negative > 0 {
            let min_value = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            issues.push(json!({
                "column": column,
                "issue": "negative_values",
                "count": negative,
                "min_value": min_value,
            }));
        }
    }

    if issues.is_empty() {
        ValidationResult::pass(
            CheckKind::ValueRanges,
            "All numeric values within expected ranges",
            json!({}),
        )
    } else {
        ValidationResult::fail(
            CheckKind::ValueRanges,
            format!("Found {} value range issues", issues.len()),
            json!({ "issues": issues }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;

    #[test]
    fn test_text_in_id_column_is_flagged() {
        let ds = Dataset::new(
            vec!["patient_id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::from("P-2"), Value::from("b")],
                vec![Value::Null, Value::from("c")],
            ],
        )
        .unwrap();
        let res = check_data_types(&ds);
        assert!(!res.passed);
        let issue = &res.detail("issues").unwrap()[0];
        assert_eq!(issue["column"], "patient_id");
        assert_eq!(issue["non_numeric_count"], 1);
        assert_eq!(issue["actual_type"], "text");
    }

    #[test]
    fn test_numeric_columns_pass() {
        let ds = Dataset::new(
            vec!["total_amount".into()],
            vec![vec![Value::Float(1.5)], vec![Value::Null]],
        )
        .unwrap();
        assert!(check_data_types(&ds).passed);
    }

    #[test]
    fn test_negative_duration_reports_minimum() {
        let ds = Dataset::new(
            vec!["wait_minutes".into(), "patient_age".into()],
            vec![
                vec![Value::Integer(-5), Value::Integer(30)],
                vec![Value::Integer(-12), Value::Integer(40)],
                vec![Value::Integer(3), Value::Null],
            ],
        )
        .unwrap();
        let res = check_value_ranges(&ds);
        assert!(!res.passed);
        let issues = res.detail("issues").unwrap().as_array().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0]["count"], 2);
        assert_eq!(issues[0]["min_value"], -12.0);
    }

    #[test]
    fn test_non_numeric_range_column_is_ignored() {
        let ds = Dataset::new(vec!["visit_count".into()], vec![vec![Value::from("-1")]]).unwrap();
        assert!(check_value_ranges(&ds).passed);
    }
}
