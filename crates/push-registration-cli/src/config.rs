//! Configuration loaded from environment variables.

use anyhow::{Context, Result};
use push_registration::{Endpoints, ServiceConfig, SystemInfo};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend project identifiers
    pub service: ServiceConfig,

    /// Device metadata reported during check-in and registration
    #[serde(default)]
    pub device: SystemInfo,

    /// Client behaviour
    #[serde(default)]
    pub client: ClientConfig,

    /// Backend URL overrides
    #[serde(default)]
    pub endpoints: Endpoints,

    /// Hex-encoded platform push token
    pub platform_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Register against the sandbox push environment
    #[serde(default)]
    pub sandbox: bool,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How long to wait for the whole handshake
    #[serde(default = "default_handshake_timeout", with = "humantime_serde")]
    pub handshake_timeout: Duration,

    /// Where handshake state is persisted between runs
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sandbox: false,
            timeout: default_timeout(),
            handshake_timeout: default_handshake_timeout(),
            state_path: default_state_path(),
            log_level: default_log_level(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_state_path() -> PathBuf {
    PathBuf::from("push-registration-state.json")
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::build(config::Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(config::Environment::default().source(Some(vars)))
    }

    fn build(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                source
                    .separator("__")
                    // Sender and project ids are numeric strings; keep them as strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Decode the configured platform token.
    pub fn platform_token_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(self.platform_token.trim()).context("PLATFORM_TOKEN is not valid hex")
    }
}
