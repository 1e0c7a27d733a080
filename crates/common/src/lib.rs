pub mod config;
pub mod error;
pub mod fixed;
pub mod types;
