// harvester-core/src/domain/validation/checks/duplicates.rs

use std::collections::HashMap;

use serde_json::json;

use crate::domain::dataset::{Dataset, ValueKey};
use crate::domain::validation::report::{CheckKind, ValidationResult};
use crate::domain::validation::rules::{DuplicateRule, SourceRules};

const SAMPLE_ROWS: usize = 5;

/// Key columns: the source's primary key when present in the data, else the
/// configured generic keys that exist in the data.
pub fn resolve_key_columns(data: &Dataset, rule: &DuplicateRule, source: &SourceRules) -> Vec<String> {
    if let Some(pk) = &source.primary_key
        && data.has_column(pk)
    {
        return vec![pk.clone()];
    }
    rule.key_columns
        .iter()
        .filter(|c| data.has_column(c))
        .cloned()
        .collect()
}

pub fn check_duplicates(data: &Dataset, rule: &DuplicateRule, source: &SourceRules) -> ValidationResult {
    let keys = resolve_key_columns(data, rule, source);

    if keys.is_empty() {
        // Cannot check: reported as a pass, flagged `checked=false`.
        return ValidationResult::pass(
            CheckKind::Duplicates,
            "No usable key columns for duplicate checking",
            json!({
                "checked": false,
                "configured_key_columns": rule.key_columns,
                "primary_key": source.primary_key,
            }),
        );
    }

    let indices: Vec<usize> = keys.iter().filter_map(|k| data.column_index(k)).collect();
    let mut occurrences: HashMap<Vec<ValueKey>, usize> = HashMap::new();
    for row in data.rows() {
        *occurrences.entry(Dataset::key_of(row, &indices)).or_default() += 1;
    }

    // Every row of a repeated key counts, not just the repeats.
    let duplicates: Vec<_> = data
        .rows()
        .iter()
        .filter(|row| occurrences.get(&Dataset::key_of(row, &indices)).copied().unwrap_or(0) > 1)
        .collect();
    let duplicate_count = duplicates.len();

    if duplicate_count == 0 {
        ValidationResult::pass(
            CheckKind::Duplicates,
            format!("No duplicates found on keys: {:?}", keys),
            json!({ "checked": true, "key_columns": keys, "duplicate_count": 0 }),
        )
    } else {
        let samples: Vec<_> = duplicates
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| data.row_as_json(row))
            .collect();
        ValidationResult::fail(
            CheckKind::Duplicates,
            format!("Found {} duplicate records", duplicate_count),
            json!({
                "checked": true,
                "key_columns": keys,
                "duplicate_count": duplicate_count,
                "sample_duplicates": samples,
            }),
        )
    }
}
