// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawConfigFile, RedeployConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// Missing keys take their defaults; zero periods, a marker file that is
/// not a bare name and ignore globs that do not compile are rejected.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RedeployConfig> {
    let raw_config = load_from_path(&path)?;
    RedeployConfig::try_from(raw_config)
}

/// Parse and validate configuration held in memory.
pub fn from_toml_str(contents: &str) -> Result<RedeployConfig> {
    let raw_config: RawConfigFile = toml::from_str(contents)?;
    RedeployConfig::try_from(raw_config)
}

/// `Redeploy.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Redeploy.toml")
}
