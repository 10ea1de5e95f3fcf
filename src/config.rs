use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub mod site;

pub use site::{SiteConfig, SitesConfig, TransportConfig};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub notifier: NotifierConfig,
    pub sites: SitesConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Portal call settings that are not part of a job request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Fixed pause between attempts of one call
    pub retry_delay_ms: u64,
}

impl RemoteConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub timeout_secs: u64,
    /// Events buffered per job while the webhook is slow; newer events are dropped beyond this
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    crate::services::notifier::DEFAULT_QUEUE_CAPACITY
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            remote: RemoteConfig {
                retry_delay_ms: 500,
            },
            notifier: NotifierConfig {
                timeout_secs: 10,
                queue_capacity: default_queue_capacity(),
            },
            sites: SitesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("failed to parse config file: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::config("server port must not be 0"));
        }

        if self.notifier.timeout_secs == 0 {
            return Err(AppError::config("notifier timeout must not be 0"));
        }

        if self.notifier.queue_capacity == 0 {
            return Err(AppError::config("notifier queue capacity must not be 0"));
        }

        if self.remote.retry_delay_ms > 60_000 {
            return Err(AppError::config("retry delay must not exceed 60s"));
        }

        if let Err(e) = self.sites.validate() {
            return Err(AppError::config(format!("invalid site configuration: {}", e)));
        }

        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::config(format!("failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
