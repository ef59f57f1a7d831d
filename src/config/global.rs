//! Global configuration.
//!
//! Loaded from ~/.config/autopilot/autopilot.yml or .autopilot.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::job::{JobConfig, JobsConfig};
use crate::domain::JobKind;
use crate::scheduler::BackoffConfig;

/// Global configuration for Autopilot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Task registry settings.
    pub registry: RegistryConfig,

    /// Account session settings.
    pub sessions: SessionsConfig,

    /// Rate-limit backoff settings.
    pub backoff: BackoffSection,

    /// Per-kind job settings.
    pub jobs: JobsConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .autopilot.yml in current directory
    /// 3. ~/.config/autopilot/autopilot.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".autopilot.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .autopilot.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .autopilot.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("autopilot").join("autopilot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Resolved settings for one job kind.
    pub fn job(&self, kind: JobKind) -> JobConfig {
        self.jobs.resolve(kind)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.registry.stop_grace_ms == 0 {
            eyre::bail!("registry.stop-grace-ms must be > 0");
        }
        if self.sessions.handshake_timeout_ms == 0 {
            eyre::bail!("sessions.handshake-timeout-ms must be > 0");
        }
        for kind in JobKind::ALL {
            self.job(kind).validate(kind)?;
        }
        Ok(())
    }
}

/// Task registry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long `stop` waits for a loop to exit before aborting it.
    #[serde(rename = "stop-grace-ms")]
    pub stop_grace_ms: u64,
}

impl RegistryConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { stop_grace_ms: 10_000 }
    }
}

/// Account session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Bound on connect + authorization check.
    #[serde(rename = "handshake-timeout-ms")]
    pub handshake_timeout_ms: u64,
}

impl SessionsConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 30_000,
        }
    }
}

/// Rate-limit backoff settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffSection {
    /// Cap on the exponential floor for repeated rate limits.
    #[serde(rename = "max-floor-secs")]
    pub max_floor_secs: u64,

    /// Longer cool-downs skip the account for the cycle instead of waiting inline.
    #[serde(rename = "max-inline-wait-secs")]
    pub max_inline_wait_secs: u64,
}

impl BackoffSection {
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            max_floor: Duration::from_secs(self.max_floor_secs),
            max_inline_wait: Duration::from_secs(self.max_inline_wait_secs),
        }
    }
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            max_floor_secs: 64,
            max_inline_wait_secs: 300,
        }
    }
}
