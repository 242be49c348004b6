// src/commands/mod.rs
//! Command handlers for the walletpass CLI

mod package;
mod service;

// Re-export all command handlers
pub use package::{cmd_generate, cmd_inspect, cmd_verify};
pub use service::{cmd_balance, cmd_fetch, cmd_issue, cmd_register};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walletpass::Config;

/// Load the configuration named on the command line
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Output path for a package, defaulting to `<serial>.pkpass`
pub(crate) fn output_path(output: Option<PathBuf>, file_name: String) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(file_name))
}
