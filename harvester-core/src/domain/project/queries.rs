// harvester-core/src/domain/project/queries.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variables available to query templates.
#[derive(Debug, Clone, Serialize)]
pub struct QueryVars<'a> {
    pub table: &'a str,
    /// `YYYY-MM-DD`, empty when the run has no lower bound.
    pub start_date: String,
    pub end_date: String,
    pub batch_size: usize,
    pub batch_offset: usize,
}

impl<'a> QueryVars<'a> {
    pub fn new(
        table: &'a str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        batch_size: usize,
        batch_offset: usize,
    ) -> Self {
        let fmt = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        Self {
            table,
            start_date: fmt(start),
            end_date: fmt(end),
            batch_size,
            batch_offset,
        }
    }

    pub fn at_offset(&self, batch_offset: usize) -> Self {
        Self {
            batch_offset,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Query templates for one source. At least one must be present.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QueryTemplate {
    #[serde(default)]
    pub incremental_query: Option<String>,
    #[serde(default)]
    pub full_query: Option<String>,
    /// Generic fallback; also the unpaged query for reference sources.
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryTemplate {
    /// Incremental runs prefer `incremental_query`; every run falls back to
    /// `full_query`, then `query`.
    pub fn select(&self, incremental: bool) -> Option<&str> {
        let preferred = if incremental {
            self.incremental_query.as_deref()
        } else {
            None
        };
        preferred
            .or(self.full_query.as_deref())
            .or(self.query.as_deref())
    }

    /// The single unpaged query used for reference data.
    pub fn reference(&self) -> Option<&str> {
        self.query.as_deref().or(self.full_query.as_deref())
    }

    pub fn all(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("incremental_query", self.incremental_query.as_deref()),
            ("full_query", self.full_query.as_deref()),
            ("query", self.query.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.all().next().is_none()
    }
}

/// The `queries.yaml` document.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QueryCatalog {
    #[serde(default)]
    pub queries: BTreeMap<String, QueryTemplate>,
}

impl QueryCatalog {
    pub fn get(&self, source: &str) -> Option<&QueryTemplate> {
        self.queries.get(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_order() {
        let t = QueryTemplate {
            incremental_query: Some("inc".into()),
            full_query: Some("full".into()),
            query: Some("q".into()),
        };
        assert_eq!(t.select(true), Some("inc"));
        assert_eq!(t.select(false), Some("full"));

        let only_generic = QueryTemplate {
            query: Some("q".into()),
            ..Default::default()
        };
        assert_eq!(only_generic.select(true), Some("q"));
        assert!(QueryTemplate::default().select(true).is_none());
        assert!(QueryTemplate::default().is_empty());
    }

    #[test]
    fn test_vars_render_dates() {
        let vars = QueryVars::new("visits", NaiveDate::from_ymd_opt(2026, 1, 5), None, 100, 0);
        let json = vars.at_offset(200).to_json();
        assert_eq!(json["start_date"], "2026-01-05");
        assert_eq!(json["end_date"], "");
        assert_eq!(json["batch_offset"], 200);
        assert_eq!(json["table"], "visits");
    }
}
