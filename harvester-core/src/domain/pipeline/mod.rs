// harvester-core/src/domain/pipeline/mod.rs

pub mod execution;
pub mod metrics;
pub mod state;

pub use execution::{
    ExecutionEntry, ExecutionLog, Phase, PhaseStatus, RunStatus, RunSummary, SourceValidation,
};
pub use metrics::{OperationMetric, PerformanceMetrics, PerformanceReport, Stopwatch};
pub use state::PipelineState;
