// harvester-core/src/infrastructure/mod.rs

pub mod adapters;
pub mod alert;
pub mod checkpoint;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fs;
