// harvester-core/src/application/mod.rs

pub mod extraction;
pub mod load;
pub mod ports;
pub mod transform;

pub mod pipeline;
pub mod scheduler;

// --- RE-EXPORTS (FACADE PATTERN) ---
// The CLI imports use cases from here, e.g.
// `use harvester_core::application::{BatchExtractor, EtlPipeline, RunRequest};`
// without knowing the file layout.

pub use extraction::{BatchExtractor, ExtractionOutcome, ExtractionStats, extraction_stats};
pub use load::OutputStage;
pub use pipeline::{EtlPipeline, RunRequest};
pub use scheduler::Scheduler;
pub use transform::transform_dataset;
