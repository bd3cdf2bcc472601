// harvester-core/src/domain/validation/mod.rs

pub mod checks;
pub mod report;
pub mod rules;
pub mod validator;

pub use report::{CheckKind, ValidationReport, ValidationResult, ValidationSummary};
pub use rules::{
    DateBound, DateRule, DuplicateRule, IntegrityRule, NullCheckRule, QualityConfig, Relationship,
    RowCountRule, SourceRules,
};
pub use validator::DataValidator;
