// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::watch::WatchHandle;

#[derive(Error, Debug)]
pub enum RedeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch facility error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to watch directory {dir:?}: {reason}")]
    Register { dir: PathBuf, reason: String },

    #[error("Unrecognised watch handle {0}")]
    UnknownWatchHandle(WatchHandle),

    #[error("Watched directory {0:?} has no owning module root")]
    UnresolvedDirectory(PathBuf),

    #[error("Cannot find any deployments for module root {0:?}")]
    UnknownModuleRoot(PathBuf),

    #[error("Deploy failed: {0}")]
    Deploy(String),

    #[error("Undeploy failed: {0}")]
    Undeploy(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RedeployError {
    /// True for errors that indicate a broken watch index rather than an
    /// expected runtime condition.
    pub fn is_inconsistency(&self) -> bool {
        matches!(
            self,
            RedeployError::UnknownWatchHandle(_)
                | RedeployError::UnresolvedDirectory(_)
                | RedeployError::UnknownModuleRoot(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RedeployError>;
