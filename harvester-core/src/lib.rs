// harvester-core/src/lib.rs

#![allow(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports: contracts towards the outside world (sources, writers, alert sinks, clock).
pub mod ports;

// 2. Domain: datasets, validation rules, checkpoints, retry, run state.
// Depends on nothing but ports.
pub mod domain;

// 3. Infrastructure: DuckDB adapters, YAML config, JSON checkpoint file, templates.
pub mod infrastructure;

// 4. Application: extraction loop, transform, load, orchestration, scheduling.
pub mod application;

pub mod error;

pub use error::HarvestError;
