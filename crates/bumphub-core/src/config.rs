//! BumpHub configuration system.
//!
//! Everything the engine consumes but does not define: the manual
//! cooldown, the per-tier auto-bump interval table, driver cadences,
//! dispatch timeouts, and the health-check target list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BumpHubError, Result};
use crate::types::Tier;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BumpHubConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub status_board: StatusBoardConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for BumpHubConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            cooldown: CooldownConfig::default(),
            tiers: TierConfig::default(),
            notifier: NotifierConfig::default(),
            status_board: StatusBoardConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl BumpHubConfig {
    /// Load config from the default path (~/.bumphub/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BumpHubError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BumpHubError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| BumpHubError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the BumpHub home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bumphub")
    }
}

/// Store (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    BumpHubConfig::home_dir()
        .join("bumphub.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Manual bump cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Minimum seconds between two manual bumps by the same member.
    #[serde(default = "default_manual_cooldown")]
    pub manual_secs: i64,
}

fn default_manual_cooldown() -> i64 {
    2 * 3600
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            manual_secs: default_manual_cooldown(),
        }
    }
}

/// Per-tier auto-bump interval table (seconds). `Tier::None` never
/// auto-bumps regardless of these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_basic_interval")]
    pub basic_secs: i64,
    #[serde(default = "default_standard_interval")]
    pub standard_secs: i64,
    #[serde(default = "default_premium_interval")]
    pub premium_secs: i64,
}

fn default_basic_interval() -> i64 {
    12 * 3600
}
fn default_standard_interval() -> i64 {
    6 * 3600
}
fn default_premium_interval() -> i64 {
    3 * 3600
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            basic_secs: default_basic_interval(),
            standard_secs: default_standard_interval(),
            premium_secs: default_premium_interval(),
        }
    }
}

impl TierConfig {
    /// Auto-bump interval for a tier. `None` for tiers without the
    /// capability.
    pub fn interval_secs(&self, tier: Tier) -> Option<i64> {
        match tier {
            Tier::None => None,
            Tier::Basic => Some(self.basic_secs),
            Tier::Standard => Some(self.standard_secs),
            Tier::Premium => Some(self.premium_secs),
        }
    }
}

/// Watermark notifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Daemon cadence for notifier passes.
    #[serde(default = "default_notifier_interval")]
    pub interval_secs: u64,
    /// Max concurrent webhook deliveries per pass.
    #[serde(default = "default_fanout")]
    pub fanout_concurrency: usize,
    /// Public site base URL used for listing links in payloads.
    #[serde(default = "default_site_base")]
    pub site_base: String,
}

fn default_notifier_interval() -> u64 {
    30
}
fn default_fanout() -> usize {
    4
}
fn default_site_base() -> String {
    "https://bumphub.example".to_string()
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_notifier_interval(),
            fanout_concurrency: default_fanout(),
            site_base: default_site_base(),
        }
    }
}

/// One HTTP health-check target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthTarget {
    pub name: String,
    pub url: String,
}

/// Status board configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBoardConfig {
    /// Daemon cadence for status-board passes.
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
    /// External HTTP dependencies to probe, besides the store itself.
    #[serde(default)]
    pub health_targets: Vec<HealthTarget>,
}

fn default_status_interval() -> u64 {
    3600
}

impl Default for StatusBoardConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_status_interval(),
            health_targets: Vec::new(),
        }
    }
}

/// Outbound dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-call HTTP timeout. A hung destination must not stall the
    /// batch barrier beyond this.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per delivery (1 = no retries).
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay, doubled per retry.
    #[serde(default = "default_backoff")]
    pub backoff_base_ms: u64,
    /// Daemon cadence for auto-bump passes.
    #[serde(default = "default_autobump_interval")]
    pub autobump_interval_secs: u64,
}

fn default_timeout() -> u64 {
    10
}
fn default_attempts() -> u32 {
    3
}
fn default_backoff() -> u64 {
    500
}
fn default_autobump_interval() -> u64 {
    3600
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_attempts(),
            backoff_base_ms: default_backoff(),
            autobump_interval_secs: default_autobump_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = BumpHubConfig::default();
        assert_eq!(config.cooldown.manual_secs, 7200);
        assert!(config.tiers.premium_secs < config.tiers.basic_secs);
        assert_eq!(config.tiers.interval_secs(Tier::None), None);
        assert_eq!(config.tiers.interval_secs(Tier::Standard), Some(21600));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: BumpHubConfig = toml::from_str(
            r#"
            [cooldown]
            manual_secs = 3600

            [tiers]
            premium_secs = 1800

            [[status_board.health_targets]]
            name = "api"
            url = "https://example.com/health"
            "#,
        )
        .unwrap();
        assert_eq!(config.cooldown.manual_secs, 3600);
        assert_eq!(config.tiers.premium_secs, 1800);
        assert_eq!(config.tiers.basic_secs, 43200);
        assert_eq!(config.status_board.health_targets.len(), 1);
        assert_eq!(config.dispatch.max_attempts, 3);
    }

    #[test]
    fn roundtrip_toml() {
        let config = BumpHubConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: BumpHubConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.notifier.fanout_concurrency, config.notifier.fanout_concurrency);
    }
}
