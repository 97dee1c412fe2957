// src/config/mod.rs

//! Configuration loading and validation for the redeployer.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate periods, the marker file name and ignore globs (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, from_toml_str, load_and_validate, load_from_path};
pub use model::{RawConfigFile, RedeployConfig, RedeploySection};
pub use validate::validate_section;
