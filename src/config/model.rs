// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::logging::LogLevel;
use crate::types::{DEFAULT_MARKER_FILE, DetectionStrategy};

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [redeploy]
/// strategy = "watch"
/// tick_period_ms = 200
/// grace_period_ms = 500
/// redeploy_check_period_ms = 1000
/// marker_file = ".redeployme"
/// ignore = ["**/*.swp", "**/*~"]
/// log_level = "debug"
/// ```
///
/// Every key, and the section itself, is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub redeploy: RedeploySection,
}

/// `[redeploy]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeploySection {
    #[serde(default)]
    pub strategy: DetectionStrategy,

    /// How often the watch strategy drains notifications.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Quiet time after the last change before a module root is redeployed.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// How often the marker strategy probes for sentinel files.
    #[serde(default = "default_redeploy_check_period_ms")]
    pub redeploy_check_period_ms: u64,

    #[serde(default = "default_marker_file")]
    pub marker_file: String,

    /// Globs, relative to a module root, whose changes never trigger a
    /// redeploy.
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

fn default_tick_period_ms() -> u64 {
    200
}

fn default_grace_period_ms() -> u64 {
    500
}

fn default_redeploy_check_period_ms() -> u64 {
    1000
}

fn default_marker_file() -> String {
    DEFAULT_MARKER_FILE.to_string()
}

impl Default for RedeploySection {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::default(),
            tick_period_ms: default_tick_period_ms(),
            grace_period_ms: default_grace_period_ms(),
            redeploy_check_period_ms: default_redeploy_check_period_ms(),
            marker_file: default_marker_file(),
            ignore: Vec::new(),
            log_level: None,
        }
    }
}

/// Validated redeployer configuration.
///
/// Built from [`RawConfigFile`] through `TryFrom` (see `validate.rs`), or
/// directly by a host that configures the redeployer in code.
#[derive(Debug, Clone, PartialEq)]
pub struct RedeployConfig {
    pub strategy: DetectionStrategy,
    pub tick_period: Duration,
    pub grace_period: Duration,
    pub redeploy_check_period: Duration,
    pub marker_file: String,
    pub ignore: Vec<String>,
    pub log_level: Option<LogLevel>,
}

impl RedeployConfig {
    pub(crate) fn new_unchecked(section: RedeploySection) -> Self {
        Self {
            strategy: section.strategy,
            tick_period: Duration::from_millis(section.tick_period_ms),
            grace_period: Duration::from_millis(section.grace_period_ms),
            redeploy_check_period: Duration::from_millis(section.redeploy_check_period_ms),
            marker_file: section.marker_file,
            ignore: section.ignore,
            log_level: section.log_level,
        }
    }
}

impl Default for RedeployConfig {
    fn default() -> Self {
        Self::new_unchecked(RedeploySection::default())
    }
}
