//! Installation identity: first issuance or auth token refresh.

use crate::error::StageError;
use crate::fid::generate_fid;
use crate::transport::HttpRequest;
use crate::types::{Endpoints, InstallationRecord, ServiceConfig, SDK_VERSION};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

const AUTH_VERSION: &str = "FIS_v2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallationResponse {
    auth_token: Option<AuthToken>,
    refresh_token: Option<String>,
    fid: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthToken {
    token: Option<String>,
}

/// Build the installation request.
///
/// Without an `existing` record a new identity is issued under a freshly
/// generated FID; otherwise the stored refresh token buys a new auth token.
pub fn build_request(
    endpoints: &Endpoints,
    config: &ServiceConfig,
    existing: Option<&InstallationRecord>,
) -> Result<HttpRequest, StageError> {
    let sdk_version = format!("i:{}", SDK_VERSION);

    let request = match existing {
        Some(record) => HttpRequest::post(
            endpoints.installation_refresh_url(&config.project_id, &record.app_instance_id),
        )
        .header(
            "Authorization",
            format!("{} {}", AUTH_VERSION, record.refresh_token),
        )
        .json(&json!({ "installation": { "sdkVersion": sdk_version } }))?,
        None => HttpRequest::post(endpoints.installation_issue_url(&config.project_id)).json(
            &json!({
                "appId": config.app_id,
                "authVersion": AUTH_VERSION,
                "fid": generate_fid(),
                "sdkVersion": sdk_version,
            }),
        )?,
    };

    Ok(request
        .header("X-Goog-Api-Key", config.api_key.expose_secret().as_str())
        .header("X-Ios-Bundle-Identifier", config.bundle_id.as_str())
        .header("X-firebase-client-log-type", "0"))
}

/// Parse the response to a request built from the same `existing` record.
pub fn parse_response(
    body: &[u8],
    existing: Option<&InstallationRecord>,
) -> Result<InstallationRecord, StageError> {
    let response: InstallationResponse = serde_json::from_slice(body)?;

    match existing {
        Some(record) => {
            let token = response.token.ok_or(StageError::MissingField("token"))?;
            Ok(InstallationRecord {
                auth_token: Some(token),
                ..record.clone()
            })
        }
        None => Ok(InstallationRecord {
            auth_token: Some(
                response
                    .auth_token
                    .and_then(|auth| auth.token)
                    .ok_or(StageError::MissingField("authToken.token"))?,
            ),
            refresh_token: response
                .refresh_token
                .ok_or(StageError::MissingField("refreshToken"))?,
            app_instance_id: response.fid.ok_or(StageError::MissingField("fid"))?,
        }),
    }
}
