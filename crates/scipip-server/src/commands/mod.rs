//! CLI command implementations for `scipip`.
//!
//! - [`serve`] -- Run the HTTP API until Ctrl+C.
//! - [`generate`] -- Run one pipeline in-process and print the result.

pub mod generate;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use scipip_core::ServiceConfig;

/// Environment variable naming the config file when `--config` is absent.
const CONFIG_ENV: &str = "SCIPIP_CONFIG";

/// Load configuration from the given path, `SCIPIP_CONFIG`, or defaults,
/// then apply environment overrides.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    let path = config_override
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    ServiceConfig::load(path.as_deref()).context("failed to load configuration")
}
