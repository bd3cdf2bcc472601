// harvester-core/src/domain/validation/checks/dates.rs

use chrono::{NaiveDateTime, NaiveTime};
use serde_json::json;

use crate::domain::dataset::Dataset;
use crate::domain::validation::report::{CheckKind, ValidationResult};
use crate::domain::validation::rules::{DateRule, SourceRules};

/// The declared date column plus every column whose name contains "date", deduplicated.
pub fn candidate_date_columns(data: &Dataset, source: &SourceRules) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    if let Some(declared) = &source.date_column {
        columns.push(declared.clone());
    }
    for column in data.columns() {
        if column.to_lowercase().contains("date") && !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}

/// Checks against the rule's own bounds, `today` meaning `now`.
pub fn check_date_ranges(
    data: &Dataset,
    rule: &DateRule,
    source: &SourceRules,
    now: NaiveDateTime,
) -> ValidationResult {
    check_date_ranges_at(data, rule, source, rule.max_date.resolve(now))
}

/// Same as [`check_date_ranges`] with an explicit upper bound (the `today` sentinel resolved by the caller).
pub fn check_date_ranges_at(
    data: &Dataset,
    rule: &DateRule,
    source: &SourceRules,
    max_date: NaiveDateTime,
) -> ValidationResult {
    let min_date = rule.min_date.and_time(NaiveTime::MIN);
    let candidates = candidate_date_columns(data, source);
    let mut issues = Vec::new();

    for column in candidates.iter().filter(|c| data.has_column(c)) {
        let nulls_before = data.null_count(column);
        let parsed: Vec<Option<NaiveDateTime>> =
            data.column_values(column).map(|v| v.to_datetime()).collect();
        let nulls_after = parsed.iter().filter(|p| p.is_none()).count();

        let invalid = nulls_after.saturating_sub(nulls_before);
        if invalid > 0 {
            issues.push(json!({
                "column": column,
                "issue": "invalid_format",
                "count": invalid,
            }));
        }

        let valid: Vec<NaiveDateTime> = parsed.into_iter().flatten().collect();
        let too_early = valid.iter().filter(|d| **d < min_date).count();
        let too_late = valid.iter().filter(|d| **d > max_date).count();

        if too_early > 0 {
            issues.push(json!({
                "column": column,
                "issue": "before_min_date",
                "count": too_early,
                "min_date": min_date.format("%Y-%m-%d").to_string(),
            }));
        }
        if too_late > 0 {
            issues.push(json!({
                "column": column,
                "issue": "after_max_date",
                "count": too_late,
                "max_date": max_date.format("%Y-%m-%d").to_string(),
            }));
        }
    }

    if issues.is_empty() {
        ValidationResult::pass(
            CheckKind::DateRanges,
            "All date columns within valid ranges",
            json!({ "validated_columns": candidates }),
        )
    } else {
        ValidationResult::fail(
            CheckKind::DateRanges,
            format!("Found {} date range issues", issues.len()),
            json!({ "issues": issues, "validated_columns": candidates }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;
    use crate::domain::validation::rules::DateBound;
    use chrono::NaiveDate;

    fn data() -> Dataset {
        Dataset::new(
            vec!["visit_date".into(), "Discharge_Date".into(), "recorded".into()],
            vec![
                vec![Value::from("2020-05-01"), Value::Null, Value::from("2020-01-01")],
                vec![Value::from("not-a-date"), Value::from("2010-01-01"), Value::Null],
                vec![Value::Null, Value::from("2100-06-01"), Value::from("1999-01-01")],
            ],
        )
        .unwrap()
    }

    fn max() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2099, 12, 31)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_candidates_include_declared_and_named() {
        let source = SourceRules {
            date_column: Some("recorded".into()),
            ..Default::default()
        };
        let cols = candidate_date_columns(&data(), &source);
        assert_eq!(cols, vec!["recorded", "visit_date", "Discharge_Date"]);
    }

    #[test]
    fn test_counts_each_issue_kind() {
        let res = check_date_ranges_at(&data(), &DateRule::default(), &SourceRules::default(), max());
        assert!(!res.passed);
        let issues = res.detail("issues").unwrap().as_array().unwrap();
        // visit_date: 1 invalid. Discharge_Date: 1 early, 1 late.
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0]["issue"], "invalid_format");
        assert_eq!(issues[0]["count"], 1);
        assert_eq!(issues[1]["issue"], "before_min_date");
        assert_eq!(issues[2]["issue"], "after_max_date");
    }

    #[test]
    fn test_preexisting_nulls_are_not_invalid() {
        let ds = Dataset::new(
            vec!["visit_date".into()],
            vec![vec![Value::Null], vec![Value::from("2021-01-01")]],
        )
        .unwrap();
        let res = check_date_ranges_at(&ds, &DateRule::default(), &SourceRules::default(), max());
        assert!(res.passed);
    }

    #[test]
    fn test_today_bound_follows_given_instant() {
        let rule = DateRule {
            max_date: DateBound::Today,
            ..Default::default()
        };
        let ds = Dataset::new(
            vec!["visit_date".into()],
            vec![vec![Value::from("2026-05-04")]],
        )
        .unwrap();
        let day = |d: u32| {
            NaiveDate::from_ymd_opt(2026, 5, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        };

        assert!(check_date_ranges(&ds, &rule, &SourceRules::default(), day(5)).passed);
        let res = check_date_ranges(&ds, &rule, &SourceRules::default(), day(3));
        assert!(!res.passed);
        assert_eq!(res.details["issues"][0]["issue"], "after_max_date");
    }

    #[test]
    fn test_declared_column_absent_is_skipped() {
        let source = SourceRules {
            date_column: Some("missing".into()),
            ..Default::default()
        };
        let ds = Dataset::new(vec!["id".into()], vec![vec![Value::Integer(1)]]).unwrap();
        assert!(check_date_ranges_at(&ds, &DateRule::default(), &source, max()).passed);
    }
}
