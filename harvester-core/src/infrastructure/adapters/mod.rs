pub mod duckdb;
pub mod writer;

pub use self::duckdb::DuckDbSource;
pub use writer::DuckDbWriter;
