// src/deploy/model.rs

use std::path::{Path, PathBuf};

/// Opaque per-deployment configuration, passed through untouched.
pub type ModuleConfig = serde_json::Value;

/// A running unit as known to the deployment manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// Unique deployment id.
    pub name: String,
    /// Artifact the deployment was created from.
    pub module_name: String,
    /// Root of the artifact on disk; `None` for units not backed by files.
    pub module_dir: Option<PathBuf>,
    pub config: ModuleConfig,
    pub instances: usize,
    /// Set for children spawned by another deployment.
    pub parent: Option<String>,
}

impl Deployment {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Only top-level, file-backed deployments are redeployed directly;
    /// children come back when their parent is redeployed.
    pub fn is_redeploy_candidate(&self) -> bool {
        self.is_top_level() && self.module_dir.is_some()
    }

    pub fn module_dir(&self) -> Option<&Path> {
        self.module_dir.as_deref()
    }

    /// The request that recreates this deployment from the same artifact.
    pub fn redeploy_request(&self) -> DeployRequest {
        DeployRequest {
            module_name: self.module_name.clone(),
            config: self.config.clone(),
            instances: self.instances,
            parent: None,
        }
    }
}

/// Arguments for starting a module.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub module_name: String,
    pub config: ModuleConfig,
    pub instances: usize,
    pub parent: Option<String>,
}
