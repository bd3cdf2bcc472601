pub mod alert;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod project;
pub mod retry;
pub mod schedule;
pub mod validation;

pub use error::DomainError;
