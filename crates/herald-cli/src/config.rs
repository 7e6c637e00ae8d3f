//! TOML configuration for the herald daemon.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use herald_core::Identity;
use herald_runtime::NoticeConfig;
use herald_tracker::SourceConfig;

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_poll_timeout_s() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub token: String,
    /// Channel every notification and notice is delivered to.
    pub channel_id: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_poll_timeout_s")]
    pub poll_timeout_s: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySection {
    pub support_department: String,
    #[serde(default)]
    pub infra_issue_types: Vec<String>,
}

fn default_sync_secs() -> u64 {
    300
}

fn default_comment_watch_secs() -> u64 {
    120
}

fn default_retention_sweep_secs() -> u64 {
    3_600
}

fn default_notice_tick_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct Intervals {
    #[serde(default = "default_sync_secs")]
    pub sync_secs: u64,
    #[serde(default = "default_comment_watch_secs")]
    pub comment_watch_secs: u64,
    #[serde(default = "default_retention_sweep_secs")]
    pub retention_sweep_secs: u64,
    #[serde(default = "default_notice_tick_secs")]
    pub notice_tick_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            sync_secs: default_sync_secs(),
            comment_watch_secs: default_comment_watch_secs(),
            retention_sweep_secs: default_retention_sweep_secs(),
            notice_tick_secs: default_notice_tick_secs(),
        }
    }
}

fn default_retention_days() -> i64 {
    herald_runtime::DEFAULT_RETENTION_DAYS
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeraldConfig {
    /// SQLite file backing the task snapshot.
    pub store_path: PathBuf,
    /// Timezone for calendar-day throttling and notice schedules.
    pub reference_timezone: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    pub telegram: TelegramConfig,
    pub policy: PolicySection,
    #[serde(default)]
    pub intervals: Intervals,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub notices: Vec<NoticeConfig>,
}

impl HeraldConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("config declares no sources");
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                bail!("source with empty id");
            }
            if !seen.insert(source.id.as_str()) {
                bail!("duplicate source id '{}'", source.id);
            }
            if source.base_url.trim().is_empty() {
                bail!("source '{}' has an empty base_url", source.id);
            }
        }
        if self.telegram.token.trim().is_empty() {
            bail!("telegram token is empty");
        }
        if self.telegram.channel_id.trim().is_empty() {
            bail!("telegram channel_id is empty");
        }
        if self.policy.support_department.trim().is_empty() {
            bail!("policy.support_department is empty");
        }
        if self.retention_days < 0 {
            bail!("retention_days must be non-negative");
        }
        herald_runtime::parse_timezone(&self.reference_timezone)?;
        Ok(())
    }
}
