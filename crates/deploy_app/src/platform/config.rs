//! RON configuration file plus command-line overrides.
//!
//! Every field is optional in the file; anything left out keeps the engine
//! default. A missing file is not an error, a malformed one is.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use deploy_engine::{ClientSettings, DriverSettings};
use deploy_logging::deploy_info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "deploy_tracker.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: String,
    pub nonce: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub full_log_lines: u32,
    pub poll_interval_ms: u64,
    pub tail_max_lines: u32,
    pub require_rclone: bool,
    pub follow_activity_feed: bool,
    /// Where the last-deployment record is kept.
    pub state_dir: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let driver = DriverSettings::default();
        Self {
            base_url: client.base_url,
            nonce: client.nonce,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            full_log_lines: client.full_log_lines,
            poll_interval_ms: millis(driver.poll_interval),
            tail_max_lines: driver.tail_max_lines,
            require_rclone: driver.require_rclone,
            follow_activity_feed: driver.follow_activity_feed,
            state_dir: PathBuf::from("."),
        }
    }
}

/// Values given on the command line, which win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientSettings,
    pub driver: DriverSettings,
    pub state_dir: PathBuf,
}

impl FileConfig {
    pub fn resolve(self, overrides: Overrides) -> AppConfig {
        AppConfig {
            client: ClientSettings {
                base_url: overrides.base_url.unwrap_or(self.base_url),
                nonce: overrides.nonce.unwrap_or(self.nonce),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                full_log_lines: self.full_log_lines,
            },
            driver: DriverSettings {
                poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
                tail_max_lines: self.tail_max_lines,
                require_rclone: self.require_rclone,
                follow_activity_feed: self.follow_activity_feed,
            },
            state_dir: self.state_dir,
        }
    }
}

/// Reads `explicit`, or `deploy_tracker.ron` in the working directory when
/// no path was given.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));

    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            return Ok(FileConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading config file {}", path.display()));
        }
    };

    let config = ron::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    deploy_info!("Loaded configuration from {:?}", path);
    Ok(config)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("tracker.ron");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"(
                base_url: "https://example.com/wp-json/simplystatic/v1/",
                poll_interval_ms: 500,
                require_rclone: true,
            )"#,
        );

        let config = load(Some(&path)).unwrap();

        assert_eq!(
            config,
            FileConfig {
                base_url: "https://example.com/wp-json/simplystatic/v1/".to_string(),
                poll_interval_ms: 500,
                require_rclone: true,
                ..FileConfig::default()
            }
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "(poll_interval_ms: \"soon\")");

        let err = load(Some(&path)).unwrap_err();

        assert!(err.to_string().contains("parsing config file"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.ron"))).is_err());
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig {
            base_url: "https://from-file.example/".to_string(),
            nonce: "file-nonce".to_string(),
            ..FileConfig::default()
        };

        let config = file.resolve(Overrides {
            base_url: Some("https://from-cli.example/".to_string()),
            nonce: None,
        });

        assert_eq!(config.client.base_url, "https://from-cli.example/");
        assert_eq!(config.client.nonce, "file-nonce");
    }

    #[test]
    fn defaults_resolve_to_engine_defaults() {
        let config = FileConfig::default().resolve(Overrides::default());

        assert_eq!(config.driver.poll_interval, Duration::from_secs(1));
        assert_eq!(config.driver.tail_max_lines, 200);
        assert_eq!(config.client.request_timeout, Duration::from_secs(30));
        assert_eq!(config.client.full_log_lines, 10_000);
        assert_eq!(config.state_dir, PathBuf::from("."));
    }
}
