// harvester-core/src/domain/project/mod.rs

pub mod configuration;
pub mod queries;

pub use configuration::{
    DatabaseConfig, ExtractionConfig, FileNameVars, IncrementalConfig, LogFormat, LoggingConfig, OutputConfig,
    OutputPaths, PipelineConfig, ProjectConfig, SourceConfig,
};
pub use queries::{QueryCatalog, QueryTemplate, QueryVars};
