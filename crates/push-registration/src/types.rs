//! Handshake records, configuration values and notifications.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client SDK version reported to the installations and registration backends.
pub const SDK_VERSION: &str = "8.9.1";

/// A check-in stays usable for seven days, minus one hour of clock skew margin.
pub const CHECKIN_VALIDITY_MS: u64 = (7 * 24 * 3600 - 3600) * 1000;

/// Identifiers of the backend project this client registers against.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Application bundle identifier
    pub bundle_id: String,

    /// Backend project identifier
    pub project_id: String,

    /// API key sent to the installations backend
    pub api_key: SecretString,

    /// Backend application identifier
    pub app_id: String,

    /// Sender identifier used for token scoping
    pub sender_id: String,
}

/// Device metadata supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    pub os_version: String,
    pub app_version: String,
    pub device_model: String,
    pub locale: String,
    /// IANA zone name, e.g. `Europe/Kiev`
    pub time_zone: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os_version: "10.0".into(),
            app_version: "1.0".into(),
            device_model: String::new(),
            locale: "en".into(),
            time_zone: String::new(),
        }
    }
}

/// Backend environment the platform token belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    #[default]
    Production,
}

impl Environment {
    pub fn from_sandbox(sandbox: bool) -> Self {
        if sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    /// Prefix prepended to the hex-encoded platform token.
    pub fn token_prefix(&self) -> &'static str {
        match self {
            Self::Sandbox => "s_",
            Self::Production => "p_",
        }
    }
}

/// Backend URLs for the three handshake calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Full URL of the device check-in call
    pub checkin_url: String,

    /// Base URL of the installations service (without `/v1/...`)
    pub installations_url: String,

    /// Full URL of the token registration call
    pub register_url: String,
}

impl Endpoints {
    /// Endpoints rooted at a single base URL, as served by a local test backend.
    pub fn with_base_url(base_url: impl AsRef<str>) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        Self {
            checkin_url: format!("{}/checkin", base),
            installations_url: base.to_string(),
            register_url: format!("{}/register", base),
        }
    }

    /// URL issuing a fresh installation.
    pub fn installation_issue_url(&self, project_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/installations/",
            self.installations_url.trim_end_matches('/'),
            project_id
        )
    }

    /// URL generating a new auth token for an existing installation.
    pub fn installation_refresh_url(&self, project_id: &str, fid: &str) -> String {
        format!(
            "{}{}/authTokens:generate",
            self.installation_issue_url(project_id),
            fid
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            checkin_url: "https://device-provisioning.googleapis.com/checkin".into(),
            installations_url: "https://firebaseinstallations.googleapis.com".into(),
            register_url: "https://fcmtoken.googleapis.com/register".into(),
        }
    }
}

/// Device identity issued by the check-in stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub device_id: u64,
    pub secret_token: u64,
    pub version: String,
    pub digest: String,

    /// Milliseconds since the epoch. `None` means a fresh check-in is required.
    pub timestamp: Option<u64>,
}

impl CheckinRecord {
    /// Whether the record can still back a registration at `now_ms`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        self.timestamp
            .is_some_and(|ts| now_ms < ts.saturating_add(CHECKIN_VALIDITY_MS))
    }
}

/// Installation identity issued by the installations backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    /// Installation identifier (FID), stable once issued
    pub app_instance_id: String,
    pub refresh_token: String,

    /// `None` means the identity exists but must be refreshed before registering.
    pub auth_token: Option<String>,
}

impl InstallationRecord {
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Cached handshake results, suitable for persisting between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeState {
    #[serde(default)]
    pub checkin: Option<CheckinRecord>,
    #[serde(default)]
    pub installation: Option<InstallationRecord>,
    #[serde(default)]
    pub push_token: Option<String>,
}

/// Notification fired once per successful stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    CheckinUpdated(CheckinRecord),
    InstallationUpdated(InstallationRecord),
    PushTokenUpdated {
        push_token: String,
        platform_token: Vec<u8>,
    },
}

/// The three handshake stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Checkin,
    Installation,
    TokenRegistration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkin => write!(f, "checkin"),
            Self::Installation => write!(f, "installation"),
            Self::TokenRegistration => write!(f, "token_registration"),
        }
    }
}
