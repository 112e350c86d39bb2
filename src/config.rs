//! # Configuration Management
//!
//! Daemon configuration: session limits, the known game servers, global bans and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`Q2ADMIND_*`)
//!
//! ## Example
//! ```toml
//! [daemon]
//! max_frame_size = 65536
//! handshake_timeout = 10000
//! idle_timeout = 180000
//! default_max_players = 32
//! invite_mute_seconds = 15
//!
//! [[servers]]
//! id = 1
//! key = 1234
//! name = "dm"
//! address = "10.0.0.5"
//! port = 27910
//! public_key = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29"
//!
//! [[servers.bans]]
//! pattern = "192.168.4.0/24"
//! reason = "local griefing"
//!
//! [[bans]]
//! pattern = "10.9.*"
//! reason = "cheating"
//! ```

use crate::error::{AdminError, Result};
use crate::utils::crypto::parse_public_key;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest slot count any game server can report (slot ids are one byte)
pub const MAX_PLAYERS_LIMIT: usize = 256;

/// Default maximum frame size (64 KB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Seconds an inviting player is muted for
pub const INVITE_MUTE_SECONDS: i32 = 15;

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,

    /// Game servers allowed to connect; also the teleport directory
    #[serde(default)]
    pub servers: Vec<ServerEntry>,

    /// Global bans, checked before any server's local bans
    #[serde(default)]
    pub bans: Vec<BanRule>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| AdminError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AdminError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| AdminError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Apply `Q2ADMIND_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) {
        if let Ok(size) = std::env::var("Q2ADMIND_MAX_FRAME_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                self.daemon.max_frame_size = val;
            }
        }

        if let Ok(ms) = std::env::var("Q2ADMIND_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = ms.parse::<u64>() {
                self.daemon.handshake_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(ms) = std::env::var("Q2ADMIND_IDLE_TIMEOUT_MS") {
            if let Ok(val) = ms.parse::<u64>() {
                self.daemon.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(level) = std::env::var("Q2ADMIND_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                self.logging.log_level = val;
            }
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AdminError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| AdminError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.daemon.validate());

        for server in &self.servers {
            errors.extend(server.validate());
        }

        for (i, a) in self.servers.iter().enumerate() {
            for b in &self.servers[i + 1..] {
                if a.key == b.key {
                    errors.push(format!("Duplicate server key {} ('{}' and '{}')", a.key, a.name, b.name));
                }
                if a.name == b.name {
                    errors.push(format!("Duplicate server name '{}'", a.name));
                }
            }
        }

        for ban in &self.bans {
            errors.extend(ban.validate());
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AdminError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Limits applied to every session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonSettings {
    /// Largest accepted transport frame in bytes
    pub max_frame_size: usize,

    /// Time a peer has to acknowledge key material
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Time a session may go without receiving anything
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Slot capacity used when a server does not configure its own
    pub default_max_players: usize,

    /// Mute applied to a player who uses the invite command
    pub invite_mute_seconds: i32,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            handshake_timeout: timeout::HANDSHAKE_TIMEOUT,
            idle_timeout: timeout::IDLE_TIMEOUT,
            default_max_players: 32,
            invite_mute_seconds: INVITE_MUTE_SECONDS,
        }
    }
}

impl DaemonSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size < 256 {
            errors.push("Max frame size too small (minimum: 256 bytes)".to_string());
        } else if self.max_frame_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 16 MB)",
                self.max_frame_size
            ));
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        } else if self.handshake_timeout.as_secs() > 300 {
            errors.push("Handshake timeout too long (maximum: 300s)".to_string());
        }

        if self.idle_timeout < self.handshake_timeout {
            errors.push("Idle timeout cannot be shorter than the handshake timeout".to_string());
        }

        if self.default_max_players == 0 || self.default_max_players > MAX_PLAYERS_LIMIT {
            errors.push(format!(
                "Default max players must be between 1 and {MAX_PLAYERS_LIMIT}"
            ));
        }

        if self.invite_mute_seconds < 0 {
            errors.push("Invite mute cannot be permanent (negative seconds)".to_string());
        }

        errors
    }
}

/// A game server the daemon administers
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerEntry {
    /// Database key
    pub id: i64,

    /// Session key identifier the server presents in its hello
    pub key: i32,

    /// Display name, also the teleport destination name
    pub name: String,

    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Hex-encoded X25519 public key; required for encrypted sessions
    #[serde(default)]
    pub public_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub max_players: Option<usize>,

    /// Bans that apply only on this server
    #[serde(default)]
    pub bans: Vec<BanRule>,
}

fn default_port() -> u16 {
    27910
}

fn default_true() -> bool {
    true
}

impl ServerEntry {
    pub fn new(id: i64, key: i32, name: &str, address: &str, port: u16) -> Self {
        Self {
            id,
            key,
            name: name.to_string(),
            address: address.to_string(),
            port,
            public_key: None,
            enabled: true,
            max_players: None,
            bans: Vec::new(),
        }
    }

    /// `address:port`, as handed to a client's `connect` command
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(format!("Server {} has an empty name", self.id));
        } else if self.name.contains(char::is_whitespace) {
            errors.push(format!("Server name '{}' cannot contain whitespace", self.name));
        }

        if self.address.is_empty() {
            errors.push(format!("Server '{}' has an empty address", self.name));
        }

        if self.port == 0 {
            errors.push(format!("Server '{}' has port 0", self.name));
        }

        if i32::try_from(self.id).is_err() {
            errors.push(format!("Server '{}' id {} exceeds 32 bits", self.name, self.id));
        }

        if let Some(key) = &self.public_key {
            if parse_public_key(key).is_err() {
                errors.push(format!(
                    "Server '{}' public key must be 64 hex characters",
                    self.name
                ));
            }
        }

        if let Some(max) = self.max_players {
            if max == 0 || max > MAX_PLAYERS_LIMIT {
                errors.push(format!(
                    "Server '{}' max players must be between 1 and {MAX_PLAYERS_LIMIT}",
                    self.name
                ));
            }
        }

        for ban in &self.bans {
            errors.extend(ban.validate());
        }

        errors
    }
}

/// A ban as written in configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BanRule {
    /// Exact address, CIDR block (`a.b.c.d/n`) or trailing wildcard (`10.0.*`)
    pub pattern: String,

    /// Shown to the banned player
    pub reason: String,
}

impl BanRule {
    pub fn validate(&self) -> Vec<String> {
        match crate::policy::bans::AddressPattern::parse(&self.pattern) {
            Ok(_) => Vec::new(),
            Err(_) => vec![format!("Invalid ban pattern '{}'", self.pattern)],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to file instead of the console
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DaemonConfig::default().validate().is_empty());
    }

    #[test]
    fn test_parse_full_document() {
        let config = DaemonConfig::from_toml(
            r#"
            [daemon]
            max_frame_size = 4096
            handshake_timeout = 5000
            idle_timeout = 60000
            default_max_players = 16
            invite_mute_seconds = 30

            [[servers]]
            id = 7
            key = 99
            name = "ctf"
            address = "10.1.1.1"
            public_key = "1111111111111111111111111111111111111111111111111111111111111111"

            [[servers.bans]]
            pattern = "172.16.0.0/12"
            reason = "vpn"

            [[bans]]
            pattern = "10.9.*"
            reason = "cheating"

            [logging]
            log_level = "debug"
            log_to_file = false
            json_format = true
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.servers[0].port, 27910);
        assert!(config.servers[0].enabled);
        assert_eq!(config.servers[0].bans[0].reason, "vpn");
        assert_eq!(config.bans[0].pattern, "10.9.*");
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_example_config_round_trips() {
        let text = DaemonConfig::example_config();
        let parsed = DaemonConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.daemon.max_frame_size, MAX_FRAME_SIZE);
    }

    #[test]
    fn test_server_id_must_fit_32_bits() {
        let entry = ServerEntry::new(i64::from(i32::MAX) + 1, 1234, "dm", "10.0.0.1", 27910);
        assert_eq!(entry.validate().len(), 1);
        assert!(ServerEntry::new(i64::from(i32::MAX), 1234, "dm", "10.0.0.1", 27910)
            .validate()
            .is_empty());
    }
}
