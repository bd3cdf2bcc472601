// harvester-core/src/domain/dataset/table.rs

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::value::{Value, ValueKey};
use crate::domain::error::DomainError;

pub type Row = Vec<Value>;

/// Logical type of a column, declared by the source or inferred from its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    DateTime,
    Text,
    /// Every value is null (or there are no rows).
    Unknown,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "TIMESTAMP",
            ColumnType::Text | ColumnType::Unknown => "VARCHAR",
        }
    }
}

/// A tabular result: ordered columns and positional rows.
///
/// Every row holds exactly one value per column; constructors reject ragged input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    declared_types: Vec<Option<ColumnType>>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, DomainError> {
        let width = columns.len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(DomainError::InvalidConfig(format!(
                "row {} has {} values but the header declares {} columns",
                idx,
                row.len(),
                width
            )));
        }
        Ok(Self {
            declared_types: vec![None; width],
            columns,
            rows,
        })
    }

    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A dataset with a header but no rows.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            declared_types: vec![None; columns.len()],
            columns,
            rows: Vec::new(),
        }
    }

    /// Attach source-declared column types. Missing entries fall back to inference.
    pub fn with_declared_types(mut self, types: Vec<Option<ColumnType>>) -> Self {
        let mut types = types;
        types.resize(self.columns.len(), None);
        self.declared_types = types;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate over one column's values. Empty iterator when the column is absent.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    pub fn null_count(&self, name: &str) -> usize {
        self.column_values(name).filter(|v| v.is_null()).count()
    }

    /// Declared type if the source supplied one, otherwise inferred from non-null values.
    pub fn column_type(&self, name: &str) -> ColumnType {
        let Some(idx) = self.column_index(name) else {
            return ColumnType::Unknown;
        };
        if let Some(Some(declared)) = self.declared_types.get(idx) {
            return *declared;
        }
        self.infer_type(idx)
    }

    fn infer_type(&self, idx: usize) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;
        for value in self.rows.iter().filter_map(|r| r.get(idx)) {
            let current = match value {
                v if v.is_null() => continue,
                Value::Integer(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Float,
                Value::Date(_) => ColumnType::Date,
                Value::DateTime(_) => ColumnType::DateTime,
                Value::Text(_) | Value::Null => ColumnType::Text,
            };
            inferred = Some(match (inferred, current) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Integer), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Integer) => ColumnType::Float,
                (Some(ColumnType::Date), ColumnType::DateTime)
                | (Some(ColumnType::DateTime), ColumnType::Date) => ColumnType::DateTime,
                _ => return ColumnType::Text,
            });
        }
        inferred.unwrap_or(ColumnType::Unknown)
    }

    /// Key tuple for the given column indices.
    pub fn key_of(row: &Row, indices: &[usize]) -> Vec<ValueKey> {
        indices
            .iter()
            .map(|&i| row.get(i).map(Value::key).unwrap_or(ValueKey::Null))
            .collect()
    }

    /// Distinct non-null keys in a column.
    pub fn distinct_non_null(&self, name: &str) -> HashSet<ValueKey> {
        self.column_values(name)
            .filter(|v| !v.is_null())
            .map(Value::key)
            .collect()
    }

    /// A row as a column → JSON map, for report details.
    pub fn row_as_json(&self, row: &Row) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Append another page. The header is taken from the first non-empty page.
    pub fn append(&mut self, page: Dataset) -> Result<(), DomainError> {
        if self.columns.is_empty() {
            *self = page;
            return Ok(());
        }
        if page.columns != self.columns {
            return Err(DomainError::InvalidConfig(format!(
                "page columns {:?} do not match dataset columns {:?}",
                page.columns, self.columns
            )));
        }
        self.rows.extend(page.rows);
        Ok(())
    }

    // --- TRANSFORM HELPERS (return new datasets, never mutate in place) ---

    /// Remove exact duplicate rows, keeping first occurrences in order.
    pub fn drop_duplicate_rows(&self) -> Dataset {
        let all: Vec<usize> = (0..self.columns.len()).collect();
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(Self::key_of(row, &all)))
            .cloned()
            .collect();
        Dataset {
            columns: self.columns.clone(),
            declared_types: self.declared_types.clone(),
            rows,
        }
    }

    /// Replace a column's values with date-times, nulling what cannot be parsed.
    pub fn coerce_datetime(&self, name: &str) -> Dataset {
        let mut out = self.clone();
        if let Some(idx) = self.column_index(name) {
            for row in &mut out.rows {
                if let Some(cell) = row.get_mut(idx) {
                    *cell = cell.to_datetime().map(Value::DateTime).unwrap_or(Value::Null);
                }
            }
            out.declared_types[idx] = Some(ColumnType::DateTime);
        }
        out
    }

    /// Rename every column through `f`. Two columns mapping to one name is an error.
    pub fn rename_columns<F: Fn(&str) -> String>(&self, f: F) -> Result<Dataset, DomainError> {
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(self.columns.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for original in &self.columns {
            let renamed = f(original);
            if let Some(first) = seen.insert(renamed.clone(), original.as_str()) {
                return Err(DomainError::ColumnCollision {
                    column: renamed,
                    first: first.to_string(),
                    second: original.clone(),
                });
            }
            columns.push(renamed);
        }
        let mut out = self.clone();
        out.columns = columns;
        Ok(out)
    }

    /// Add a column holding the same value on every row, replacing any existing one.
    pub fn with_constant_column(&self, name: &str, value: Value, ty: ColumnType) -> Dataset {
        let mut out = self.clone();
        match out.column_index(name) {
            Some(idx) => {
                for row in &mut out.rows {
                    row[idx] = value.clone();
                }
                out.declared_types[idx] = Some(ty);
            }
            None => {
                out.columns.push(name.to_string());
                out.declared_types.push(Some(ty));
                for row in &mut out.rows {
                    row.push(value.clone());
                }
            }
        }
        out
    }
}
