//! Configuration loading and validation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sinew_core::RobotConfig;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub robot: RobotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Robot name, also used as the frame system name
    #[serde(default = "default_name")]
    pub name: String,
    /// Bind address for the REST API
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bind address of the remote responder; parents reach this robot there
    #[serde(default)]
    pub remote_bind: Option<String>,
    /// Upper bound for each round-trip to a remote
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            bind: default_bind(),
            remote_bind: None,
            remote_timeout_ms: default_remote_timeout_ms(),
        }
    }
}

impl DaemonConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

fn default_name() -> String {
    "sinew".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_remote_timeout_ms() -> u64 {
    5000
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_daemon_and_robot_sections() {
        let config: Config = toml::from_str(
            r#"
[daemon]
bind = "127.0.0.1:9000"
remote_bind = "0.0.0.0:9090"

[[robot.components]]
name = "arm1"
subtype = "arm"
model = "fake"

[[robot.remotes]]
name = "r1"
address = "10.0.0.2:9090"
frame_prefix = true
"#,
        )
        .unwrap();

        assert_eq!(config.daemon.name, "sinew");
        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.daemon.remote_bind.as_deref(), Some("0.0.0.0:9090"));
        assert_eq!(config.daemon.remote_timeout(), Duration::from_secs(5));
        assert_eq!(config.robot.components.len(), 1);
        assert!(config.robot.remotes[0].frame_prefix);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/sinew.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
        assert!(config.robot.components.is_empty());
    }

    #[test]
    fn test_sample_config_parses() {
        let content = include_str!("../../../sinew.toml");
        let config: Config = toml::from_str(content).unwrap();
        assert!(!config.robot.components.is_empty());
    }
}
