// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{RawConfigFile, RedeployConfig, RedeploySection};
use crate::errors::{RedeployError, Result};
use crate::watch::IgnoreSet;

impl TryFrom<RawConfigFile> for RedeployConfig {
    type Error = RedeployError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_section(&raw.redeploy)?;
        Ok(RedeployConfig::new_unchecked(raw.redeploy))
    }
}

/// Check a `[redeploy]` section without building a config from it.
pub fn validate_section(section: &RedeploySection) -> Result<()> {
    validate_periods(section)?;
    validate_marker_file(&section.marker_file)?;
    IgnoreSet::new(&section.ignore)?;
    Ok(())
}

fn validate_periods(section: &RedeploySection) -> Result<()> {
    let periods = [
        ("tick_period_ms", section.tick_period_ms),
        ("grace_period_ms", section.grace_period_ms),
        ("redeploy_check_period_ms", section.redeploy_check_period_ms),
    ];
    for (key, value) in periods {
        if value == 0 {
            return Err(RedeployError::ConfigError(format!(
                "[redeploy].{key} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_marker_file(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(RedeployError::ConfigError(format!(
            "[redeploy].marker_file must be a bare file name (got {name:?})"
        ))),
    }
}
