// harvester-core/src/domain/validation/checks/integrity.rs

use std::collections::{BTreeMap, HashSet};

use serde_json::json;

use crate::domain::dataset::{Dataset, ValueKey};
use crate::domain::validation::report::{CheckKind, ValidationResult};
use crate::domain::validation::rules::{IntegrityRule, Relationship, SourceRules};

const SAMPLE_ORPHANS: usize = 10;

/// One result per relationship whose child is `source`, or a single placeholder
/// pass when none apply.
///
/// The parent's key column is its declared primary key, falling back to the
/// foreign key name when the parent declares none.
pub fn check_referential_integrity(
    data: &Dataset,
    source: &str,
    rule: &IntegrityRule,
    reference_data: &BTreeMap<String, Dataset>,
    source_rules: &BTreeMap<String, SourceRules>,
) -> Vec<ValidationResult> {
    let results: Vec<ValidationResult> = rule
        .relationships
        .iter()
        .filter(|rel| rel.child == source)
        .map(|rel| {
            let parent_pk = source_rules
                .get(&rel.parent)
                .and_then(|r| r.primary_key.clone())
                .unwrap_or_else(|| rel.foreign_key.clone());
            check_relationship(data, rel, &parent_pk, reference_data.get(&rel.parent))
        })
        .collect();

    if results.is_empty() {
        vec![ValidationResult::pass(
            CheckKind::ReferentialIntegrity(None),
            "No referential integrity checks configured for this source",
            json!({ "checked": false }),
        )]
    } else {
        results
    }
}

fn check_relationship(
    data: &Dataset,
    rel: &Relationship,
    parent_pk: &str,
    parent: Option<&Dataset>,
) -> ValidationResult {
    let kind = CheckKind::ReferentialIntegrity(Some(rel.parent.clone()));

    let Some(parent) = parent else {
        return ValidationResult::pass(
            kind,
            format!("Parent table {} not available for integrity check", rel.parent),
            json!({ "checked": false, "parent": rel.parent }),
        );
    };

    if !data.has_column(&rel.foreign_key) {
        return ValidationResult::pass(
            kind,
            format!("Foreign key column {} not present", rel.foreign_key),
            json!({ "checked": false, "foreign_key": rel.foreign_key }),
        );
    }

    if !parent.has_column(parent_pk) {
        return ValidationResult::fail(
            kind,
            format!("Primary key column {} not found in parent table {}", parent_pk, rel.parent),
            json!({ "checked": false, "parent": rel.parent, "primary_key": parent_pk }),
        );
    }

    let parent_keys: HashSet<ValueKey> = parent.distinct_non_null(parent_pk);
    let orphan_keys: HashSet<ValueKey> = data
        .distinct_non_null(&rel.foreign_key)
        .into_iter()
        .filter(|k| !parent_keys.contains(k))
        .collect();

    if orphan_keys.is_empty() {
        return ValidationResult::pass(
            kind,
            format!("Referential integrity maintained with {}", rel.parent),
            json!({
                "checked": true,
                "parent": rel.parent,
                "foreign_key": rel.foreign_key,
                "orphaned_count": 0,
            }),
        );
    }

    // Sample in row order so reports are stable across runs.
    let mut seen = HashSet::new();
    let samples: Vec<_> = data
        .column_values(&rel.foreign_key)
        .filter(|v| !v.is_null())
        .filter(|v| {
            let key = v.key();
            orphan_keys.contains(&key) && seen.insert(key)
        })
        .take(SAMPLE_ORPHANS)
        .map(|v| v.to_json())
        .collect();

    ValidationResult::fail(
        kind,
        format!("Found {} orphaned records", orphan_keys.len()),
        json!({
            "checked": true,
            "parent": rel.parent,
            "foreign_key": rel.foreign_key,
            "orphaned_count": orphan_keys.len(),
            "sample_orphaned_keys": samples,
        }),
    )
}
