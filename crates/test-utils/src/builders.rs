#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use hot_redeploy::config::{RawConfigFile, RedeployConfig, RedeploySection};
use hot_redeploy::deploy::Deployment;
use hot_redeploy::types::DetectionStrategy;

/// Builder for `RedeployConfig` to simplify test setup.
///
/// Goes through the same validation as a loaded file.
pub struct RedeployConfigBuilder {
    section: RedeploySection,
}

impl RedeployConfigBuilder {
    pub fn new() -> Self {
        Self {
            section: RedeploySection::default(),
        }
    }

    pub fn strategy(mut self, strategy: DetectionStrategy) -> Self {
        self.section.strategy = strategy;
        self
    }

    pub fn tick_period(mut self, period: Duration) -> Self {
        self.section.tick_period_ms = period.as_millis() as u64;
        self
    }

    pub fn grace_period(mut self, period: Duration) -> Self {
        self.section.grace_period_ms = period.as_millis() as u64;
        self
    }

    pub fn check_period(mut self, period: Duration) -> Self {
        self.section.redeploy_check_period_ms = period.as_millis() as u64;
        self
    }

    pub fn marker_file(mut self, name: &str) -> Self {
        self.section.marker_file = name.to_string();
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.section.ignore.push(pattern.to_string());
        self
    }

    pub fn build(self) -> RedeployConfig {
        RedeployConfig::try_from(RawConfigFile {
            redeploy: self.section,
        })
        .expect("Failed to build valid config from builder")
    }
}

impl Default for RedeployConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Deployment`.
///
/// Defaults to a top-level, single-instance deployment with a null config.
pub struct DeploymentBuilder {
    deployment: Deployment,
}

impl DeploymentBuilder {
    pub fn new(name: &str, module_name: &str) -> Self {
        Self {
            deployment: Deployment {
                name: name.to_string(),
                module_name: module_name.to_string(),
                module_dir: None,
                config: serde_json::Value::Null,
                instances: 1,
                parent: None,
            },
        }
    }

    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.deployment.module_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.deployment.config = config;
        self
    }

    pub fn instances(mut self, instances: usize) -> Self {
        self.deployment.instances = instances;
        self
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.deployment.parent = Some(parent.to_string());
        self
    }

    pub fn build(self) -> Deployment {
        self.deployment
    }
}
