use std::time::Duration;

use taskwatch_core::POLL_INTERVAL;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("invalid base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("timeout {name} must be greater than zero")]
    ZeroTimeout { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    /// Application action kinds whose `TaskStarted` actions start polling.
    pub task_actions: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            task_actions: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.poll_interval.is_zero() {
            return Err(SettingsError::ZeroInterval);
        }
        Ok(())
    }
}

/// Where the HTTP task source finds the backend.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: Url,
    pub tasks_path: String,
    pub task_path: String,
    pub remove_path: String,
    pub remove_many_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl SourceSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            tasks_path: "tasks".to_string(),
            task_path: "task".to_string(),
            remove_path: "remove".to_string(),
            remove_many_path: "remove-tasks".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, SettingsError> {
        let url = Url::parse(base_url).map_err(|err| SettingsError::BaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        let settings = Self::new(url);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.base_url.cannot_be_a_base() {
            return Err(SettingsError::BaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout {
                name: "connect_timeout",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout {
                name: "request_timeout",
            });
        }
        Ok(())
    }

    /// Resolves an endpoint path against the base url. A base without a
    /// trailing slash is treated as a directory all the same.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(path.trim_start_matches('/'))
    }
}
