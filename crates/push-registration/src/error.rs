//! Registration client errors.

use thiserror::Error;

/// Failure to obtain a response body.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Why a handshake stage failed.
///
/// All variants lead to the same recovery: the stage's cached state is
/// invalidated and the next `register` call starts over from that stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Response body is not valid UTF-8")]
    InvalidEncoding,

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(&'static str),
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Registration driver has stopped")]
    Stopped,
}
