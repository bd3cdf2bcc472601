// harvester-core/src/ports/writer.rs

use crate::domain::dataset::Dataset;
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = InfrastructureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(InfrastructureError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Serializes a dataset to a file.
pub trait DatasetWriter: Send + Sync {
    /// Writes `data` to `path`, creating parent directories.
    fn write(&self, data: &Dataset, path: &Path, format: OutputFormat) -> Result<(), HarvestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("Parquet".parse::<OutputFormat>().ok(), Some(OutputFormat::Parquet));
        assert!(matches!(
            "excel".parse::<OutputFormat>(),
            Err(InfrastructureError::UnsupportedFormat(f)) if f == "excel"
        ));
    }
}
