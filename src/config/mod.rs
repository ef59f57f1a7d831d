//! Configuration system for Autopilot.
//!
//! Two layers:
//! 1. Global config (~/.config/autopilot/autopilot.yml or .autopilot.yml)
//! 2. Per-job-kind overrides (the `jobs:` section) on top of built-in kind defaults

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{BackoffSection, GlobalConfig, RegistryConfig, SessionsConfig};
pub use self::job::{Breadth, JobConfig, JobOverrides, JobsConfig};

mod global;
mod job;

/// Load configuration from the standard search paths and validate it.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .autopilot.yml in current directory (project config)
/// 3. ~/.config/autopilot/autopilot.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    let config = GlobalConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
