pub mod core;
pub mod import;
pub mod marks;
pub mod reports;
pub mod setup;
pub mod students;
pub mod subjects;
