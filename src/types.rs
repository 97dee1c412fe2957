use std::str::FromStr;
use serde::Deserialize;

/// How the redeployer notices that a module's artifact changed on disk.
///
/// - `Watch`: real-time filesystem notifications on every directory under a
///   module root, debounced per root (default behaviour).
/// - `Marker`: poll every deployed module directory for a sentinel file
///   (`.redeployme` by default) and redeploy when it appears. Useful where
///   filesystem events are unavailable, or when a build tool should decide
///   when a redeploy happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    #[default]
    Watch,
    Marker,
}

impl FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "watch" => Ok(DetectionStrategy::Watch),
            "marker" => Ok(DetectionStrategy::Marker),
            other => Err(format!(
                "invalid strategy: {other} (expected \"watch\" or \"marker\")"
            )),
        }
    }
}

/// Sentinel file name used by the marker strategy unless configured otherwise.
pub const DEFAULT_MARKER_FILE: &str = ".redeployme";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Marker".parse::<DetectionStrategy>(), Ok(DetectionStrategy::Marker));
        assert_eq!(" watch ".parse::<DetectionStrategy>(), Ok(DetectionStrategy::Watch));
        assert!("poll".parse::<DetectionStrategy>().is_err());
    }
}
