// harvester-core/src/domain/ports/mod.rs

pub mod checkpoint;

pub use checkpoint::CheckpointStore;
