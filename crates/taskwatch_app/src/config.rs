//! RON configuration file for the `taskwatch` binary.
//!
//! Every field is optional; a missing file means all defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use taskwatch_core::POLL_INTERVAL;
use taskwatch_engine::{EngineSettings, SettingsError, SourceSettings};
use taskwatch_logging::watch_debug;
use thiserror::Error;

use crate::logging::LogDestination;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub tasks_path: String,
    pub task_path: String,
    pub remove_path: String,
    pub remove_many_path: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub task_actions: Vec<String>,
    pub log: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/background".to_string(),
            tasks_path: "tasks".to_string(),
            task_path: "task".to_string(),
            remove_path: "remove".to_string(),
            remove_many_path: "remove-tasks".to_string(),
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            task_actions: Vec::new(),
            log: LogDestination::Terminal,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            task_actions: self.task_actions.clone(),
        }
    }

    pub fn source_settings(&self) -> Result<SourceSettings, SettingsError> {
        let mut settings = SourceSettings::parse(&self.base_url)?;
        settings.tasks_path = self.tasks_path.clone();
        settings.task_path = self.task_path.clone();
        settings.remove_path = self.remove_path.clone();
        settings.remove_many_path = self.remove_many_path.clone();
        settings.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        settings.request_timeout = Duration::from_secs(self.request_timeout_secs);
        settings.validate()?;
        watch_debug!("task source at {}", settings.base_url);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use crate::logging::LogDestination;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use taskwatch_engine::SettingsError;
    use tempfile::TempDir;

    #[test]
    fn missing_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(&temp.path().join("taskwatch.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.engine_settings().poll_interval, Duration::from_millis(2000));
    }

    #[test]
    fn partial_file_overrides_only_what_it_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskwatch.ron");
        fs::write(
            &path,
            r#"(
                base_url: "https://panel.example.com/api/background",
                poll_interval_ms: 500,
                task_actions: ["module/INSTALL"],
                log: Both,
            )"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.log, LogDestination::Both);
        assert_eq!(config.tasks_path, "tasks");

        let source = config.source_settings().unwrap();
        assert_eq!(
            source.endpoint(&source.tasks_path).unwrap().as_str(),
            "https://panel.example.com/api/background/tasks"
        );
        assert_eq!(config.engine_settings().task_actions, vec!["module/INSTALL"]);
    }

    #[test]
    fn reports_parse_errors_and_bad_settings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskwatch.ron");
        fs::write(&path, "(poll_interval_ms: \"soon\")").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));

        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(
            config.source_settings().unwrap_err(),
            SettingsError::ZeroTimeout {
                name: "request_timeout"
            }
        );
    }
}
