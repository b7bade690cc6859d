//! Gymplan configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Remote assistant endpoints
    pub service: ServiceConfig,

    /// Local persistence
    pub storage: StorageConfig,

    /// Transient notice timing
    pub notices: NoticeConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .gymplan.yml
        let local_config = PathBuf::from(".gymplan.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/gymplan/gymplan.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gymplan").join("gymplan.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(PathBuf::from(".gymplan.yml")),
            dirs::config_dir().map(|d| d.join("gymplan").join("gymplan.yml")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Remote assistant endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the REST endpoints
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Streaming chat endpoint
    #[serde(rename = "chat-url")]
    pub chat_url: String,

    /// Request timeout in milliseconds (REST calls only; the stream has none)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            chat_url: "ws://localhost:8000/ws/chat".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Local persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the session identity and default exports
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/gymplan on Linux)
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join("gymplan"))
            .unwrap_or_else(|| PathBuf::from(".gymplan"));
        Self { data_dir }
    }
}

impl StorageConfig {
    /// File holding the persisted chat session identity
    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("session_id")
    }
}

/// Transient notice timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// How long an insights notice stays visible
    #[serde(rename = "insight-ttl-ms")]
    pub insight_ttl_ms: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self { insight_ttl_ms: 10_000 }
    }
}

impl NoticeConfig {
    pub fn insight_ttl(&self) -> Duration {
        Duration::from_millis(self.insight_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.service.base_url, "http://localhost:8000");
        assert_eq!(config.service.chat_url, "ws://localhost:8000/ws/chat");
        assert_eq!(config.notices.insight_ttl(), Duration::from_secs(10));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: DEBUG
service:
  base-url: https://coach.example.com
  chat-url: wss://coach.example.com/ws/chat
  timeout-ms: 5000
storage:
  data-dir: /tmp/gymplan-test
notices:
  insight-ttl-ms: 2500
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.service.base_url, "https://coach.example.com");
        assert_eq!(config.service.timeout_ms, 5000);
        assert_eq!(config.storage.session_file(), PathBuf::from("/tmp/gymplan-test/session_id"));
        assert_eq!(config.notices.insight_ttl_ms, 2500);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
service:
  base-url: http://10.0.0.5:8000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.service.base_url, "http://10.0.0.5:8000");

        // Defaults for unspecified
        assert_eq!(config.service.chat_url, "ws://localhost:8000/ws/chat");
        assert_eq!(config.service.timeout_ms, 120_000);
        assert_eq!(config.notices.insight_ttl_ms, 10_000);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gp.yml");
        fs::write(&path, "log-level: WARN\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("WARN"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("WARN"));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let path = PathBuf::from("/definitely/not/here/gp.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
