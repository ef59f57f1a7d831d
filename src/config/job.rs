//! Per-job-kind configuration.
//!
//! Each kind has built-in defaults; the YAML file may override any field per
//! kind. Distribution cycles faster than the reply scanners, joins throttle
//! hardest.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::JobKind;

/// How much content each account sends per distribution cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Breadth {
    /// One content item per account per cycle, rotating
    One,
    /// Every content item per account per cycle
    All,
}

/// Resolved settings for one job kind.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// Sleep between cycles.
    pub cycle_interval: Duration,
    /// Sleep when there are no accounts or no content/targets/rules.
    pub idle_interval: Duration,
    /// Pause between consecutive items of one account.
    pub item_pause: Duration,
    /// Concurrency ceiling for fan-out.
    pub max_concurrency: usize,
    /// Distribution breadth.
    pub breadth: Breadth,
    /// Close every pooled session after each distribution cycle.
    pub recycle_sessions: bool,
    /// Recent messages scanned per destination (reply kinds).
    pub inbound_limit: usize,
    /// Chance that a random-reply rule fires on a message.
    pub reply_probability: f64,
}

impl JobConfig {
    /// Built-in defaults for a kind.
    pub fn defaults_for(kind: JobKind) -> Self {
        let base = Self {
            cycle_interval: Duration::from_secs(60),
            idle_interval: Duration::from_secs(60),
            item_pause: Duration::from_secs(1),
            max_concurrency: 8,
            breadth: Breadth::One,
            recycle_sessions: false,
            inbound_limit: 20,
            reply_probability: 1.0,
        };

        match kind {
            JobKind::Distribute => Self {
                cycle_interval: Duration::from_secs(30),
                idle_interval: Duration::from_secs(30),
                item_pause: Duration::from_secs(2),
                recycle_sessions: true,
                ..base
            },
            JobKind::Join => Self {
                cycle_interval: Duration::from_secs(900),
                idle_interval: Duration::from_secs(120),
                item_pause: Duration::from_secs(30),
                max_concurrency: 1,
                ..base
            },
            JobKind::PrivateReply | JobKind::GroupReply => base,
            JobKind::RandomReply => Self {
                cycle_interval: Duration::from_secs(90),
                ..base
            },
        }
    }

    /// Apply overrides on top of these settings.
    pub fn with_overrides(mut self, overrides: &JobOverrides) -> Self {
        if let Some(secs) = overrides.cycle_interval_secs {
            self.cycle_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.idle_interval_secs {
            self.idle_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = overrides.item_pause_ms {
            self.item_pause = Duration::from_millis(ms);
        }
        if let Some(n) = overrides.max_concurrency {
            self.max_concurrency = n;
        }
        if let Some(breadth) = overrides.breadth {
            self.breadth = breadth;
        }
        if let Some(recycle) = overrides.recycle_sessions {
            self.recycle_sessions = recycle;
        }
        if let Some(limit) = overrides.inbound_limit {
            self.inbound_limit = limit;
        }
        if let Some(p) = overrides.reply_probability {
            self.reply_probability = p;
        }
        self
    }

    /// Validate the resolved settings.
    pub fn validate(&self, kind: JobKind) -> eyre::Result<()> {
        if self.max_concurrency == 0 {
            eyre::bail!("jobs.{}.max-concurrency must be > 0", kind);
        }
        if self.cycle_interval.is_zero() {
            eyre::bail!("jobs.{}.cycle-interval-secs must be > 0", kind);
        }
        if self.idle_interval.is_zero() {
            eyre::bail!("jobs.{}.idle-interval-secs must be > 0", kind);
        }
        if !(0.0..=1.0).contains(&self.reply_probability) {
            eyre::bail!("jobs.{}.reply-probability must be within [0, 1]", kind);
        }
        if kind.is_reply() && self.inbound_limit == 0 {
            eyre::bail!("jobs.{}.inbound-limit must be > 0", kind);
        }
        Ok(())
    }
}

/// Optional per-kind overrides as written in YAML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_pause_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadth: Option<Breadth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recycle_sessions: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_probability: Option<f64>,
}

/// The `jobs:` section: overrides per kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JobsConfig {
    pub distribute: JobOverrides,
    pub join: JobOverrides,
    pub private_reply: JobOverrides,
    pub group_reply: JobOverrides,
    pub random_reply: JobOverrides,
}

impl JobsConfig {
    pub fn overrides(&self, kind: JobKind) -> &JobOverrides {
        match kind {
            JobKind::Distribute => &self.distribute,
            JobKind::Join => &self.join,
            JobKind::PrivateReply => &self.private_reply,
            JobKind::GroupReply => &self.group_reply,
            JobKind::RandomReply => &self.random_reply,
        }
    }

    pub fn overrides_mut(&mut self, kind: JobKind) -> &mut JobOverrides {
        match kind {
            JobKind::Distribute => &mut self.distribute,
            JobKind::Join => &mut self.join,
            JobKind::PrivateReply => &mut self.private_reply,
            JobKind::GroupReply => &mut self.group_reply,
            JobKind::RandomReply => &mut self.random_reply,
        }
    }

    /// Defaults for the kind with its overrides applied.
    pub fn resolve(&self, kind: JobKind) -> JobConfig {
        JobConfig::defaults_for(kind).with_overrides(self.overrides(kind))
    }
}
