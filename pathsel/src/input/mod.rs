pub mod config;
pub mod problem;
pub mod scenario;
