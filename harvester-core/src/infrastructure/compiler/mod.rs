pub mod jinja;
pub mod sql;
