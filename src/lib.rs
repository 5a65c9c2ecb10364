pub mod calc;
pub mod config;
pub mod db;
pub mod grading;
pub mod ipc;
pub mod model;
pub mod records;
pub mod store;
pub mod validate;
