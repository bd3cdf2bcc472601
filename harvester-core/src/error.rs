// harvester-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    // --- DOMAIN (configuration contracts, validation verdicts, run state) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE (IO, parsing, database) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- UPSTREAM SOURCE FAILURES ---
    #[error("Extraction from '{source_name}' failed: {message}")]
    Extraction {
        source_name: String,
        message: String,
    },

    #[error("Transformation of '{source_name}' failed: {message}")]
    Transform {
        source_name: String,
        message: String,
    },

    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl HarvestError {
    /// Whether re-running the operation may succeed.
    ///
    /// Configuration problems and validation verdicts are final; anything the
    /// upstream database or the source adapter raised is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            HarvestError::Extraction { .. } => true,
            HarvestError::Infrastructure(InfrastructureError::Database(_)) => true,
            HarvestError::Infrastructure(InfrastructureError::Io(_)) => true,
            HarvestError::Domain(_) => false,
            HarvestError::Transform { .. } => false,
            HarvestError::Infrastructure(_) => false,
            HarvestError::InternalError(_) => false,
        }
    }

    /// True when the run was halted by a critical validation failure.
    pub fn is_critical_validation_failure(&self) -> bool {
        matches!(
            self,
            HarvestError::Domain(DomainError::CriticalValidationFailure { .. })
        )
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<duckdb::Error> for HarvestError {
    fn from(err: duckdb::Error) -> Self {
        HarvestError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(err)))
    }
}
