// harvester-core/src/domain/validation/checks/mod.rs
//
// One function per check. Each is pure over the dataset and returns exactly one result
// (referential integrity returns one per relationship).

pub mod dates;
pub mod duplicates;
pub mod integrity;
pub mod nulls;
pub mod row_count;
pub mod types;

pub use dates::check_date_ranges;
pub use duplicates::check_duplicates;
pub use integrity::check_referential_integrity;
pub use nulls::check_null_values;
pub use row_count::check_row_count;
pub use types::{check_data_types, check_value_ranges};
