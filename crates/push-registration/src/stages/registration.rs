//! Push token registration.

use crate::error::StageError;
use crate::transport::HttpRequest;
use crate::types::{
    CheckinRecord, Environment, InstallationRecord, ServiceConfig, SystemInfo, SDK_VERSION,
};

/// Everything the registration call is built from.
pub struct RegistrationInput<'a> {
    pub url: &'a str,
    pub config: &'a ServiceConfig,
    pub info: &'a SystemInfo,
    pub environment: Environment,
    pub checkin: Option<&'a CheckinRecord>,
    pub installation: Option<&'a InstallationRecord>,
    pub platform_token: &'a [u8],
}

/// Hex-encode the platform token behind its environment prefix.
pub fn encode_platform_token(token: &[u8], environment: Environment) -> String {
    format!("{}{}", environment.token_prefix(), hex::encode(token))
}

pub fn build_request(input: RegistrationInput<'_>) -> Result<HttpRequest, StageError> {
    let checkin = input
        .checkin
        .filter(|c| c.timestamp.is_some())
        .ok_or(StageError::MissingPrerequisite("valid check-in"))?;
    let installation = input
        .installation
        .ok_or(StageError::MissingPrerequisite("installation"))?;
    let auth_token = installation
        .auth_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(StageError::MissingPrerequisite("installation auth token"))?;

    let config = input.config;
    let form = [
        ("app", config.bundle_id.clone()),
        ("gmp_app_id", config.app_id.clone()),
        ("sender", config.sender_id.clone()),
        ("X-subtype", config.sender_id.clone()),
        ("app_ver", input.info.app_version.clone()),
        ("X-osv", input.info.os_version.clone()),
        ("X-cliv", format!("fiid-{}", SDK_VERSION)),
        ("device", checkin.device_id.to_string()),
        ("appid", installation.app_instance_id.clone()),
        (
            "apns_token",
            encode_platform_token(input.platform_token, input.environment),
        ),
        ("plat", "2".to_string()),
        ("X-scope", "*".to_string()),
    ];

    Ok(HttpRequest::post(input.url)
        .header("app", config.bundle_id.as_str())
        .header("info", checkin.version.as_str())
        .header(
            "Authorization",
            format!("AidLogin {}:{}", checkin.device_id, checkin.secret_token),
        )
        .header("x-goog-firebase-installations-auth", auth_token)
        .header("X-firebase-client-log-type", "0")
        .form(&form))
}

/// Extract the push token from the `key=value` lines of the response.
pub fn parse_response(body: &[u8]) -> Result<String, StageError> {
    let text = std::str::from_utf8(body).map_err(|_| StageError::InvalidEncoding)?;

    text.lines()
        .find_map(|line| line.strip_prefix("token="))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(StageError::MissingField("token"))
}
