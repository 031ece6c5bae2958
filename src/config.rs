//! Driver configuration file (TOML)

use std::path::{Path, PathBuf};
use std::time::Duration;

use g15_transport::SessionConfig;
use serde::{Deserialize, Serialize};

/// Settings for `g15ctl`, loaded from `~/.config/g15/driver.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Timeout of one key poll (ms)
    pub poll_timeout_ms: u64,
    /// Luma below this value lights an LCD pixel
    pub threshold: u8,
    /// USB session tuning
    pub session: SessionConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            threshold: 128,
            session: SessionConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("g15")
            .join("driver.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DriverConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("g15-driver-test-{}-{name}", std::process::id()))
            .join("driver.toml")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = DriverConfig::load(Path::new("/nonexistent/g15/driver.toml")).unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let toml_str = r#"
            threshold = 90

            [session]
            release_on_close = false
            claim_retries = 2
        "#;
        let config: DriverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.threshold, 90);
        assert_eq!(config.poll_timeout_ms, 1000);
        assert!(!config.session.release_on_close);
        assert_eq!(config.session.claim_retries, 2);
        assert_eq!(config.session.chunk_size, 32);
    }

    #[test]
    fn test_save_and_load() {
        let path = scratch_path("roundtrip");
        let mut config = DriverConfig::default();
        config.poll_timeout_ms = 250;
        config.session.settle_delay_ms = 10;

        config.save(&path).unwrap();
        let loaded = DriverConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.poll_timeout(), Duration::from_millis(250));

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = scratch_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "threshold = \"dark\"").unwrap();
        assert!(DriverConfig::load(&path).is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
