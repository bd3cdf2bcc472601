pub mod check;
pub mod env;
pub mod project;
pub mod queries;

pub use check::check_project;
pub use project::{Project, load_project, load_project_config};
pub use queries::load_queries;
