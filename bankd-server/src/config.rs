//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BANKD_CONFIG)
//! 3. Environment variables

use bankd_protocol::{WireMode, DEFAULT_PORT, MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Account store configuration.
    pub storage: StorageConfig,
    /// Welcome message configuration.
    pub welcome: WelcomeConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BANKD_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.storage.apply_env_overrides();
        self.welcome.apply_env_overrides();
        self.metrics.apply_env_overrides();
    }

    /// Checks values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle timeout in seconds, refreshed before every read.
    pub idle_timeout_secs: u64,
    /// Receive buffer size for every message.
    pub max_frame_bytes: usize,
    /// Message boundary format.
    pub wire_mode: WireMode,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_frame_bytes: MAX_FRAME_SIZE,
            wire_mode: WireMode::Padded,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("BANKD_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("BANKD_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(size) = std::env::var("BANKD_MAX_FRAME_BYTES") {
            if let Ok(n) = size.parse() {
                self.max_frame_bytes = n;
            }
        }

        if let Ok(mode) = std::env::var("BANKD_WIRE_MODE") {
            if let Ok(parsed) = mode.parse() {
                self.wire_mode = parsed;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "network.idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_FRAME_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "network.max_frame_bytes must be between 1 and {}",
                MAX_FRAME_SIZE
            )));
        }
        Ok(())
    }
}

/// Account store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Store file name inside the data directory.
    pub store_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            store_file: "accounts.json".to_string(),
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("BANKD_DATA") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Returns the store file path.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}

/// Welcome message configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    /// Directory holding `<lang>/welcome_message.txt`.
    pub dir: PathBuf,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./files"),
        }
    }
}

impl WelcomeConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("BANKD_WELCOME_DIR") {
            self.dir = PathBuf::from(dir);
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("BANKD_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }
        if let Ok(addr) = std::env::var("BANKD_METRICS_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 1337);
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.network.max_frame_bytes, 1024);
        assert_eq!(config.network.wire_mode, WireMode::Padded);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_path() {
        let config = StorageConfig::default();
        assert_eq!(config.store_path(), PathBuf::from("./data/accounts.json"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.network.wire_mode, config.network.wire_mode);
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            "network:\n  bind_addr: \"127.0.0.1:4000\"\n  wire_mode: length_prefixed\n",
        )
        .unwrap();
        assert_eq!(config.network.bind_addr.port(), 4000);
        assert_eq!(config.network.wire_mode, WireMode::LengthPrefixed);
        // Unspecified fields keep their defaults
        assert_eq!(config.network.idle_timeout_secs, 300);
        assert_eq!(config.storage.store_file, "accounts.json");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.network.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.max_frame_bytes = MAX_FRAME_SIZE + 1;
        assert!(config.validate().is_err());

        config.network.max_frame_bytes = 0;
        assert!(config.validate().is_err());

        config.network.max_frame_bytes = 80;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bankd.yaml");
        std::fs::write(&path, "network:\n  idle_timeout_secs: 30\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.network.idle_timeout_secs, 30);
    }
}
