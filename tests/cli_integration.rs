//! CLI Integration Tests
//!
//! - `cli::config_file` - TOML configuration files and CLI overrides
//! - `cli::binary` - the built `taskring` binary end to end

mod cli;
