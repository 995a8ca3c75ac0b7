use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::models::ErrorCode;

/// A response captured as plain data, ready to be interpreted.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }
}

/// The successful result of a call.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// The body decoded as JSON.
    Json(Value),
    /// The raw body, when it is not valid JSON.
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Result<Value, ClientError> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Text(text) => Err(ClientError::UnexpectedResponse(format!(
                "expected a JSON body, got: {text}"
            ))),
        }
    }
}

/// Turns a raw response into a payload or a categorized error.
///
/// The body is decoded as JSON whatever the declared content type says,
/// because older servers label JSON as `text/html`. A decoded object with
/// `name`, `description` and `number` keys is an error envelope:
///
/// * an unknown `number` fails with [`ClientError::UnknownError`];
/// * the invalid login code fails with [`ClientError::InvalidLogin`];
/// * any other known code is returned as the payload itself.
pub fn interpret(response: RawResponse) -> Result<Payload, ClientError> {
    let value = match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => value,
        Err(_) => return Ok(Payload::Text(response.body)),
    };

    let declared_json = response
        .content_type
        .as_deref()
        .is_some_and(|content_type| content_type.contains("application/json"));
    if !declared_json {
        tracing::debug!(
            content_type = ?response.content_type,
            "response decoded as JSON despite its content type"
        );
    }

    if let Value::Object(envelope) = &value {
        if is_error_envelope(envelope) {
            check_envelope(envelope)?;
        }
    }

    Ok(Payload::Json(value))
}

fn is_error_envelope(object: &Map<String, Value>) -> bool {
    ["name", "description", "number"]
        .iter()
        .all(|key| object.contains_key(*key))
}

fn check_envelope(envelope: &Map<String, Value>) -> Result<(), ClientError> {
    let number = &envelope["number"];
    let message = match &envelope["description"] {
        Value::String(description) => description.clone(),
        other => other.to_string(),
    };

    match ErrorCode::from_value(number) {
        ErrorCode::Unrecognized(code) => {
            tracing::error!("unrecognized error code {code}: {message}");
            Err(ClientError::UnknownError { code, message })
        }
        ErrorCode::InvalidLogin => Err(ClientError::InvalidLogin(message)),
        code => {
            tracing::warn!(?code, "error envelope returned as payload: {message}");
            Ok(())
        }
    }
}
