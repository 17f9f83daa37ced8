use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Link timings for a tag session. All values in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Timeout for ordinary exchanges, kept short so status polling stays responsive
    #[serde(default = "default_exchange_timeout_ms")]
    pub exchange_timeout_ms: u64,
    /// Timeout while a fast read or fast write moves the whole mirror
    #[serde(default = "default_bulk_timeout_ms")]
    pub bulk_timeout_ms: u64,
    #[serde(default = "default_handshake_deadline_ms")]
    pub handshake_deadline_ms: u64,
    /// Time the tag needs to sample its sensors and update the mirror
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String, // "trace", "debug", "info", "warn", "error"
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange_timeout_ms: default_exchange_timeout_ms(),
            bulk_timeout_ms: default_bulk_timeout_ms(),
            handshake_deadline_ms: default_handshake_deadline_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            log_level: default_log_level(),
        }
    }
}

fn default_exchange_timeout_ms() -> u64 {
    20
}
fn default_bulk_timeout_ms() -> u64 {
    500
}
fn default_handshake_deadline_ms() -> u64 {
    5000
}
fn default_settle_delay_ms() -> u64 {
    110
}
fn default_log_level() -> String {
    "info".to_string()
}

impl SessionConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }

    pub fn handshake_deadline(&self) -> Duration {
        Duration::from_millis(self.handshake_deadline_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[test]
fn test_defaults() {
    let config = SessionConfig::default();
    assert_eq!(config.exchange_timeout(), Duration::from_millis(20));
    assert_eq!(config.bulk_timeout(), Duration::from_millis(500));
    assert_eq!(config.handshake_deadline(), Duration::from_secs(5));
    assert_eq!(config.settle_delay(), Duration::from_millis(110));
}

#[test]
fn test_partial_json() {
    let config = SessionConfig::from_json(r#"{ "settle_delay_ms": 150, "log_level": "debug" }"#).unwrap();
    assert_eq!(config.settle_delay_ms, 150);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.exchange_timeout_ms, 20);
}

#[test]
fn test_invalid_json() {
    assert!(SessionConfig::from_json(r#"{ "settle_delay_ms": "soon" }"#).is_err());
}

#[test]
fn test_load_missing_file() {
    let err = SessionConfig::load("/nonexistent/ntagread.json").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
