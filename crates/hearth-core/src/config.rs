//! hearth.toml configuration parser.
//!
//! Every section is optional; an empty file yields the defaults below.
//! Durations are kept as strings ("30s", "1h") and parsed on access.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    pub refresh: RefreshConfig,
    pub poller: PollerConfig,
    pub locks: LocksConfig,
    pub sync: SyncConfig,
    pub executor: ExecutorConfig,
    pub provisioning: ProvisioningConfig,
    pub release_feed: ReleaseFeedConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Minimum interval between two status probes of the same server.
    pub probe_window: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            probe_window: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub delay: String,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            delay: "5s".to_string(),
            max_attempts: 12,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocksConfig {
    /// Release the setup lock when the setup task cannot be dispatched.
    /// Off by default: the lock stays in place until an operator removes it.
    pub release_on_setup_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub catalog_cooldown: String,
    pub image_min_interval: String,
    pub image_stale_after: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_cooldown: "1h".to_string(),
            image_min_interval: "24h".to_string(),
            image_stale_after: "20s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub url: String,
    pub tasks: TaskNames,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9400".to_string(),
            tasks: TaskNames::default(),
        }
    }
}

/// Names of the executor tasks behind each action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskNames {
    pub start: String,
    pub stop: String,
    pub backup: String,
    pub update: String,
    pub terminate: String,
    pub setup: String,
    pub status: String,
    pub stop_service: String,
}

impl Default for TaskNames {
    fn default() -> Self {
        Self {
            start: "start-server".to_string(),
            stop: "stop-server".to_string(),
            backup: "backup-server".to_string(),
            update: "update-server".to_string(),
            terminate: "terminate-server".to_string(),
            setup: "setup-server".to_string(),
            status: "server-status".to_string(),
            stop_service: "stop-service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub url: String,
    /// Value of the `OwnedBy` tag stamped on everything we allocate.
    pub owner_tag: String,
    pub image: ImageFilterConfig,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9401".to_string(),
            owner_tag: "hearth".to_string(),
            image: ImageFilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFilterConfig {
    pub owners: Vec<String>,
    pub name_pattern: String,
    pub architecture: String,
}

impl Default for ImageFilterConfig {
    fn default() -> Self {
        Self {
            owners: vec!["099720109477".to_string()],
            name_pattern: "ubuntu/images/hvm-ssd*24.04*".to_string(),
            architecture: "x86_64".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseFeedConfig {
    pub latest_url: String,
    pub download_url: String,
    pub asset: String,
}

impl Default for ReleaseFeedConfig {
    fn default() -> Self {
        Self {
            latest_url: "https://api.github.com/repos/hearth-games/catalog/releases/latest"
                .to_string(),
            download_url: "https://github.com/hearth-games/catalog/releases/download".to_string(),
            asset: "catalog.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub bucket: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            bucket: "hearth-backups".to_string(),
        }
    }
}

impl HearthConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: HearthConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every duration string up front so accessors never fail later.
    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("refresh.probe_window", &self.refresh.probe_window),
            ("poller.delay", &self.poller.delay),
            ("sync.catalog_cooldown", &self.sync.catalog_cooldown),
            ("sync.image_min_interval", &self.sync.image_min_interval),
            ("sync.image_stale_after", &self.sync.image_stale_after),
        ];
        for (key, value) in durations {
            if parse_duration(value).is_none() {
                anyhow::bail!("invalid duration for {key}: {value:?}");
            }
        }
        if self.poller.max_attempts == 0 {
            anyhow::bail!("poller.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn probe_window(&self) -> Duration {
        duration_or(&self.refresh.probe_window, Duration::from_secs(30))
    }

    pub fn poll_delay(&self) -> Duration {
        duration_or(&self.poller.delay, Duration::from_secs(5))
    }

    pub fn catalog_cooldown(&self) -> Duration {
        duration_or(&self.sync.catalog_cooldown, Duration::from_secs(60 * 60))
    }

    pub fn image_min_interval(&self) -> Duration {
        duration_or(&self.sync.image_min_interval, Duration::from_secs(24 * 60 * 60))
    }

    pub fn image_stale_after(&self) -> Duration {
        duration_or(&self.sync.image_stale_after, Duration::from_secs(20))
    }
}

fn duration_or(value: &str, default: Duration) -> Duration {
    parse_duration(value).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = HearthConfig::from_toml("").unwrap();
        assert_eq!(config.probe_window(), Duration::from_secs(30));
        assert_eq!(config.catalog_cooldown(), Duration::from_secs(3600));
        assert_eq!(config.image_min_interval(), Duration::from_secs(86_400));
        assert_eq!(config.image_stale_after(), Duration::from_secs(20));
        assert_eq!(config.poller.max_attempts, 12);
        assert!(!config.locks.release_on_setup_failure);
        assert_eq!(config.executor.tasks.setup, "setup-server");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let toml_str = r#"
[refresh]
probe_window = "45s"

[locks]
release_on_setup_failure = true

[executor.tasks]
start = "boot"
"#;
        let config = HearthConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.probe_window(), Duration::from_secs(45));
        assert!(config.locks.release_on_setup_failure);
        assert_eq!(config.executor.tasks.start, "boot");
        assert_eq!(config.executor.tasks.stop, "stop-server");
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let err = HearthConfig::from_toml("[refresh]\nprobe_window = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("refresh.probe_window"));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, HearthConfig::default().to_toml_string().unwrap()).unwrap();

        let config = HearthConfig::from_file(&path).unwrap();
        assert_eq!(config.backup.bucket, "hearth-backups");
    }
}
