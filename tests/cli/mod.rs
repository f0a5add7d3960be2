//! CLI integration test modules

pub mod binary;
pub mod config_file;
