// harvester-core/src/application/load.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::application::ports::TemplateEngine;
use crate::domain::dataset::Dataset;
use crate::domain::error::DomainError;
use crate::domain::project::{FileNameVars, OutputConfig};
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::writer::{DatasetWriter, OutputFormat};

/// Writes datasets in every configured format under a base directory.
pub struct OutputStage {
    writer: Arc<dyn DatasetWriter>,
    templates: Arc<dyn TemplateEngine>,
    formats: Vec<OutputFormat>,
    naming_pattern: String,
}

impl OutputStage {
    pub fn new(
        formats: Vec<OutputFormat>,
        naming_pattern: impl Into<String>,
        writer: Arc<dyn DatasetWriter>,
        templates: Arc<dyn TemplateEngine>,
    ) -> Self {
        Self {
            writer,
            templates,
            formats,
            naming_pattern: naming_pattern.into(),
        }
    }

    /// Parses `output.formats`. Unknown formats (including `excel`) are rejected.
    pub fn from_config(
        output: &OutputConfig,
        writer: Arc<dyn DatasetWriter>,
        templates: Arc<dyn TemplateEngine>,
    ) -> Result<Self, HarvestError> {
        let formats = output
            .formats
            .iter()
            .map(|f| f.parse::<OutputFormat>())
            .collect::<Result<Vec<_>, InfrastructureError>>()?;
        Ok(Self::new(formats, output.naming_pattern.clone(), writer, templates))
    }

    pub fn formats(&self) -> &[OutputFormat] {
        &self.formats
    }

    /// File name for `source` in `format`, from the naming pattern.
    pub fn file_name(
        &self,
        source: &str,
        format: OutputFormat,
        at: DateTime<Local>,
    ) -> Result<String, HarvestError> {
        let vars = FileNameVars::new(source, at, format.extension());
        let name = self.templates.render(&self.naming_pattern, &vars.to_json())?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidConfig(format!(
                "output.naming_pattern renders an empty file name for '{}'",
                source
            ))
            .into());
        }
        Ok(name.to_string())
    }

    /// Writes `data` once per format under `base_dir`.
    ///
    /// Empty datasets are skipped with a warning and produce no paths.
    pub fn write(
        &self,
        source: &str,
        data: &Dataset,
        base_dir: &Path,
        at: DateTime<Local>,
    ) -> Result<Vec<PathBuf>, HarvestError> {
        if data.is_empty() {
            warn!("No data to save for {}", source);
            return Ok(Vec::new());
        }

        let mut paths = Vec::with_capacity(self.formats.len());
        for &format in &self.formats {
            let path = base_dir.join(self.file_name(source, format, at)?);
            self.writer.write(data, &path, format)?;
            info!(path = ?path, rows = data.row_count(), "Data saved to: {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}
