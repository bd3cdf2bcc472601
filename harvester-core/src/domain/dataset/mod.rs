// harvester-core/src/domain/dataset/mod.rs

pub mod table;
pub mod value;

pub use table::{ColumnType, Dataset, Row};
pub use value::{Value, ValueKey, parse_datetime};
