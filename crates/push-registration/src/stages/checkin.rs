//! Device check-in.

use crate::error::StageError;
use crate::transport::HttpRequest;
use crate::types::{CheckinRecord, SystemInfo};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct CheckinResponse {
    android_id: Option<u64>,
    security_token: Option<u64>,
    version_info: Option<String>,
    digest: Option<String>,
    time_msec: Option<u64>,
}

/// Build the check-in request, echoing whatever identity was issued before.
pub fn build_request(
    url: &str,
    info: &SystemInfo,
    previous: Option<&CheckinRecord>,
) -> Result<HttpRequest, StageError> {
    let body = json!({
        "checkin": {
            "iosbuild": {
                "model": info.device_model,
                "os_version": format!("IOS_{}", info.os_version),
            },
            "last_checkin_msec": previous.and_then(|c| c.timestamp).unwrap_or(0),
            "type": 2,
            "user_number": 0,
        },
        "locale": info.locale,
        "time_zone": info.time_zone,
        "id": previous.map_or(0, |c| c.device_id),
        "security_token": previous.map_or(0, |c| c.secret_token),
        "digest": previous.map_or("", |c| c.digest.as_str()),
        "user_serial_number": 0,
        "fragment": 0,
        "version": 2,
    });

    Ok(HttpRequest::post(url).json(&body)?)
}

pub fn parse_response(body: &[u8]) -> Result<CheckinRecord, StageError> {
    let response: CheckinResponse = serde_json::from_slice(body)?;

    Ok(CheckinRecord {
        device_id: response
            .android_id
            .ok_or(StageError::MissingField("android_id"))?,
        secret_token: response
            .security_token
            .ok_or(StageError::MissingField("security_token"))?,
        version: response
            .version_info
            .ok_or(StageError::MissingField("version_info"))?,
        digest: response.digest.unwrap_or_default(),
        timestamp: response.time_msec,
    })
}
