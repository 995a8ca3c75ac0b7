use reqwest::StatusCode;
use serde_json::Value;

use crate::models::options::ParamKind;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported API version: {0}")]
    UnsupportedVersion(String),

    #[error("{key} must be {expected} not {actual}")]
    WrongParameter {
        key: String,
        expected: ParamKind,
        actual: ParamKind,
    },

    #[error("Invalid login: {0}")]
    InvalidLogin(String),

    #[error("Error: {code}. Message {message}")]
    UnknownError { code: Value, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("No bearer token installed, call get_token first")]
    MissingToken,

    #[error("Server response error: {status_code} - {message}")]
    ServerResponse {
        status_code: StatusCode,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}
