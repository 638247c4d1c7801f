//! Configuration for the CardioHub session client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Main configuration for the session client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session relay server
    pub channel: ChannelConfig,

    /// Biosensor discovery and GATT identifiers
    pub sensor: SensorConfig,

    /// Video-call service
    pub video: VideoConfig,

    /// Period of telemetry frames while an exercise session is active
    #[serde(with = "duration_millis")]
    pub telemetry_interval: Duration,

    /// Path for storing session statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cardiohub-session");

        Self {
            channel: ChannelConfig::default(),
            sensor: SensorConfig::default(),
            video: VideoConfig::default(),
            telemetry_interval: Duration::from_millis(1000),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cardiohub-session")
            .join("config.json")
    }

    /// Cumulative statistics file.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("session_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// `host:port` of the JSON-lines relay
    pub address: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Substring the advertised device name must contain
    pub name_filter: String,
    pub service_uuid: Uuid,
    /// Notifying ECG data characteristic
    pub characteristic_uuid: Uuid,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name_filter: "Movesense".to_string(),
            service_uuid: Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e),
            characteristic_uuid: Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Meeting links are `{base_url}/{room}`
    pub base_url: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://meet.jit.si".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.channel.address, "127.0.0.1:5000");
        assert_eq!(config.sensor.name_filter, "Movesense");
        assert_eq!(
            config.sensor.characteristic_uuid.to_string(),
            "6e400003-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(config.telemetry_interval, Duration::from_secs(1));
        assert!(config.stats_path().ends_with("session_stats.json"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "channel": { "address": "relay.local:7000" }, "telemetry_interval": 250 }"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.channel.address, "relay.local:7000");
        assert_eq!(config.telemetry_interval, Duration::from_millis(250));
        assert_eq!(config.video.base_url, "https://meet.jit.si");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.sensor.name_filter = "Polar".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sensor.name_filter, "Polar");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.video.base_url, "https://meet.jit.si");
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
