use std::path::PathBuf;
use std::time::Duration;

use crate::network::ListenerConfig;

/// How the external utility is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LaunchMode {
    /// Execute the application binary directly with the command arguments.
    Direct,
    /// Go through `open -a <app> --args ...` (macOS application bundles).
    Open,
}

impl Default for LaunchMode {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Open
        } else {
            Self::Direct
        }
    }
}

/// Bridge-level configuration: what to launch, how long to wait, and where
/// replies arrive.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Path to the external database utility.
    pub app_path: PathBuf,
    /// How the utility is started.
    pub launch_mode: LaunchMode,
    /// Per-operation deadline. `None` waits for the reply indefinitely.
    pub timeout: Option<Duration>,
    /// Shared reply listener settings.
    pub listener: ListenerConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_path: PathBuf::from("UtilAirDatabase"),
            launch_mode: LaunchMode::default(),
            timeout: None,
            listener: ListenerConfig::default(),
        }
    }
}

/// Converts a millisecond setting into a timeout. Non-positive disables it.
#[must_use]
pub fn timeout_from_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_config_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.app_path, PathBuf::from("UtilAirDatabase"));
        assert!(config.timeout.is_none());
        assert_eq!(config.listener.port, 9999);
    }

    #[test]
    fn non_positive_timeout_is_disabled() {
        assert_eq!(timeout_from_millis(-1), None);
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(1500), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn launch_mode_follows_platform() {
        let expected = if cfg!(target_os = "macos") {
            LaunchMode::Open
        } else {
            LaunchMode::Direct
        };
        assert_eq!(LaunchMode::default(), expected);
    }
}
