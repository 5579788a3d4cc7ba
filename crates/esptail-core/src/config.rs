use crate::error::EsptailError;
use crate::limits::{DEFAULT_POP_WAIT_MS, DEFAULT_QUEUE_CAPACITY, MAX_LABEL_VALUE_LEN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for esptail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Serial capture settings
    pub serial: SerialConfig,

    /// Entry queue between ingestion and shipping
    pub queue: QueueConfig,

    /// Processing modules configuration
    pub modules: ModulesConfig,

    /// Loki push target
    pub loki: LokiConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, EsptailError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EsptailError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, EsptailError> {
        toml::from_str(content)
            .map_err(|e| EsptailError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, EsptailError> {
        toml::to_string_pretty(self)
            .map_err(|e| EsptailError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check the settings the pipeline cannot run without
    pub fn validate(&self) -> Result<(), EsptailError> {
        if self.queue.capacity == 0 {
            return Err(EsptailError::Config(
                "queue.capacity must be greater than zero".to_string(),
            ));
        }
        if self.queue.pop_wait_ms == 0 {
            return Err(EsptailError::Config(
                "queue.pop_wait_ms must be greater than zero".to_string(),
            ));
        }
        self.loki.validate()
    }
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Instance name for identification
    pub instance_name: String,

    /// Internal log level: trace, debug, info, warn, error
    pub log_level: String,

    /// How many times to poll the clock for synchronization before starting
    pub time_sync_retries: u32,

    /// Delay between clock polls, in milliseconds
    pub time_sync_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: "esptail".to_string(),
            log_level: "info".to_string(),
            time_sync_retries: 10,
            time_sync_interval_ms: 2000,
        }
    }
}

/// Serial capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Console device to read, or "-" for stdin
    pub device: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
        }
    }
}

/// Entry queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of entries waiting to be shipped
    pub capacity: usize,

    /// Bounded wait of a single pop, in milliseconds
    pub pop_wait_ms: u64,
}

impl QueueConfig {
    pub fn pop_wait(&self) -> Duration {
        Duration::from_millis(self.pop_wait_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            pop_wait_ms: DEFAULT_POP_WAIT_MS,
        }
    }
}

/// Processing modules configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Severity label extraction
    pub level_labels: LevelLabelsConfig,
}

/// Severity label extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelLabelsConfig {
    pub enabled: bool,
}

impl Default for LevelLabelsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Loki push target configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LokiConfig {
    /// Loki push API endpoint
    pub endpoint: String,

    /// Request timeout
    pub timeout_seconds: u64,

    /// `emitter` label attached to every stream
    pub emitter: String,

    /// `job` label attached to every stream
    pub job: String,

    /// Static basic-auth credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl LokiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), EsptailError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(EsptailError::Config(format!(
                "loki.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(EsptailError::Config(
                "loki.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [("emitter", &self.emitter), ("job", &self.job)] {
            if value.is_empty() || value.len() > MAX_LABEL_VALUE_LEN {
                return Err(EsptailError::Config(format!(
                    "loki.{} must be 1..={} bytes",
                    name, MAX_LABEL_VALUE_LEN
                )));
            }
            if value.chars().any(char::is_control) {
                return Err(EsptailError::Config(format!(
                    "loki.{} must not contain control characters",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
            timeout_seconds: 10,
            emitter: "esptail".to_string(),
            job: "console".to_string(),
            credentials: None,
        }
    }
}

/// Basic-auth credentials for the push endpoint
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.instance_name, "esptail");
        assert_eq!(config.queue.capacity, 15);
        assert_eq!(config.queue.pop_wait(), Duration::from_millis(100));
        assert!(config.modules.level_labels.enabled);
        assert!(config.loki.credentials.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[loki]
emitter = "dev1"
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.loki.emitter, "dev1");
        // Defaults should be applied
        assert_eq!(config.loki.job, "console");
        assert_eq!(config.queue.capacity, 15);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[general]
instance_name = "bench-esp32"
log_level = "debug"

[serial]
device = "/dev/ttyACM0"

[queue]
capacity = 32
pop_wait_ms = 250

[modules.level_labels]
enabled = false

[loki]
endpoint = "https://logs.example.net/loki/api/v1/push"
timeout_seconds = 5
emitter = "dev1"
job = "fw"

[loki.credentials]
username = "tenant"
password = "secret"
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.general.instance_name, "bench-esp32");
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert_eq!(config.queue.capacity, 32);
        assert!(!config.modules.level_labels.enabled);
        assert_eq!(config.loki.job, "fw");
        let creds = config.loki.credentials.as_ref().unwrap();
        assert_eq!(creds.username, "tenant");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[loki]"));
        assert!(toml.contains("emitter"));
        assert_eq!(Config::from_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.loki.endpoint = "localhost:3100".to_string();
        assert!(matches!(config.validate(), Err(EsptailError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_long_label() {
        let mut config = Config::default();
        config.loki.job = "j".repeat(MAX_LABEL_VALUE_LEN + 1);
        assert!(config.validate().is_err());

        config.loki.job = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials {
            username: "tenant".to_string(),
            password: "secret".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("tenant"));
        assert!(!rendered.contains("secret"));
    }
}
