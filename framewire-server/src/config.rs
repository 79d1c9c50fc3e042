//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via FRAMEWIRE_CONFIG)
//! 3. Environment variables

use framewire_protocol::{SerializerAlgorithm, DEFAULT_PORT, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Wire protocol configuration.
    pub protocol: ProtocolConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FRAMEWIRE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Applies overrides from a variable lookup.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.network.apply_overrides(&lookup);
        self.protocol.apply_overrides(&lookup);
    }

    /// Checks values that would prevent the server from running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.max_connections == 0 {
            return Err(ConfigError::Validation(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        if self.network.idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "network.idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.protocol.max_payload_bytes == 0 {
            return Err(ConfigError::Validation(
                "protocol.max_payload_bytes must be at least 1".to_string(),
            ));
        }
        if self.protocol.max_payload_bytes > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::Validation(format!(
                "protocol.max_payload_bytes exceeds the {} byte limit",
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            idle_timeout_secs: 300,
            max_connections: 1000,
        }
    }
}

impl NetworkConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("FRAMEWIRE_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Some(port) = lookup("FRAMEWIRE_PORT") {
            if let Ok(port) = port.parse() {
                self.bind_addr.set_port(port);
            }
        }

        if let Some(timeout) = lookup("FRAMEWIRE_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Some(max) = lookup("FRAMEWIRE_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Wire protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Algorithm used for every outbound payload.
    pub serializer: SerializerAlgorithm,
    /// Largest payload accepted or sent.
    pub max_payload_bytes: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            serializer: SerializerAlgorithm::default(),
            max_payload_bytes: MAX_PAYLOAD_SIZE,
        }
    }
}

impl ProtocolConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("FRAMEWIRE_SERIALIZER") {
            match name.parse() {
                Ok(algorithm) => self.serializer = algorithm,
                Err(e) => tracing::warn!("ignoring FRAMEWIRE_SERIALIZER: {}", e),
            }
        }

        if let Some(max) = lookup("FRAMEWIRE_MAX_FRAME_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_payload_bytes = n;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Serde helpers that store a socket address as a string in YAML.
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
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 8080);
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.protocol.serializer, SerializerAlgorithm::Binary);
        assert_eq!(config.protocol.max_payload_bytes, MAX_PAYLOAD_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FRAMEWIRE_BIND", "127.0.0.1:9000"),
            ("FRAMEWIRE_SERIALIZER", "json"),
            ("FRAMEWIRE_MAX_FRAME_BYTES", "4096"),
            ("FRAMEWIRE_IDLE_TIMEOUT", "5"),
            ("FRAMEWIRE_MAX_CONNECTIONS", "3"),
        ]));

        assert_eq!(config.network.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.protocol.serializer, SerializerAlgorithm::Json);
        assert_eq!(config.protocol.max_payload_bytes, 4096);
        assert_eq!(config.network.idle_timeout_secs, 5);
        assert_eq!(config.network.max_connections, 3);
    }

    #[test]
    fn test_port_override_applies_after_bind() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FRAMEWIRE_BIND", "127.0.0.1:9000"),
            ("FRAMEWIRE_PORT", "9100"),
        ]));
        assert_eq!(config.network.bind_addr, "127.0.0.1:9100".parse().unwrap());
    }

    #[test]
    fn test_unparseable_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FRAMEWIRE_PORT", "not-a-port"),
            ("FRAMEWIRE_SERIALIZER", "xml"),
        ]));
        assert_eq!(config.network.bind_addr.port(), 8080);
        assert_eq!(config.protocol.serializer, SerializerAlgorithm::Binary);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "network:\n  bind_addr: \"127.0.0.1:7000\"\n  max_connections: 16\nprotocol:\n  serializer: json"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.bind_addr.port(), 7000);
        assert_eq!(config.network.max_connections, 16);
        assert_eq!(config.network.idle_timeout_secs, 300);
        assert_eq!(config.protocol.serializer, SerializerAlgorithm::Json);
    }

    #[test]
    fn test_from_file_accepts_legacy_serializer_name() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "protocol:\n  serializer: java").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.protocol.serializer, SerializerAlgorithm::Binary);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn test_from_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "network: [not, a, map]").unwrap();
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framewire.yaml");

        let mut config = Config::default();
        config.protocol.serializer = SerializerAlgorithm::Json;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.protocol.serializer, SerializerAlgorithm::Json);
        assert_eq!(loaded.network.bind_addr, config.network.bind_addr);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.network.max_connections = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.protocol.max_payload_bytes = MAX_PAYLOAD_SIZE + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_payload_limit_is_rejected() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("FRAMEWIRE_MAX_FRAME_BYTES", "0")]));
        assert_eq!(config.protocol.max_payload_bytes, 0);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_payload_bytes"));
    }
}
