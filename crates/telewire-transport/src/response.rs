//! Normalised response bodies.
//!
//! The pipeline never fails on a body it cannot parse: it hands back the raw
//! text and lets the caller decide what that means.

use serde_json::Value;
use telewire_core::{ApiError, ApiResult};

/// The body of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not JSON; kept verbatim.
    Raw(String),
}

impl ApiResponse {
    /// Parses a body, falling back to the raw text.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(body.to_string()),
        }
    }

    /// Returns `true` if the body is a JSON object with a boolean `ok` field.
    pub fn is_envelope(&self) -> bool {
        matches!(self, Self::Json(v) if v.get("ok").is_some_and(Value::is_boolean))
    }

    /// The `ok` discriminator. Anything other than `ok: true` counts as failure.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Json(v) if v.get("ok").and_then(Value::as_bool) == Some(true))
    }

    /// The remote `description`, if present.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Json(v) => v.get("description").and_then(Value::as_str),
            Self::Raw(_) => None,
        }
    }

    /// The remote `error_code`, if present.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Json(v) => v.get("error_code").and_then(Value::as_i64),
            Self::Raw(_) => None,
        }
    }

    /// Borrows the `result` field of a successful envelope.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Json(v) if self.is_ok() => v.get("result"),
            _ => None,
        }
    }

    /// Interprets the `{ok, result, description, error_code}` envelope.
    ///
    /// Returns the `result` (or `null` when absent) on success and
    /// [`ApiError::Remote`] on `ok: false`.
    pub fn into_result(self) -> ApiResult<Value> {
        if !self.is_envelope() {
            return Err(ApiError::UnexpectedResponse(self.into_text()));
        }
        if !self.is_ok() {
            return Err(ApiError::Remote {
                error_code: self.error_code(),
                description: self
                    .description()
                    .unwrap_or("no description provided")
                    .to_string(),
            });
        }
        match self {
            Self::Json(Value::Object(mut map)) => Ok(map.remove("result").unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        }
    }

    /// Renders the body back to text.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(v) => v.to_string(),
            Self::Raw(s) => s,
        }
    }
}

impl From<Value> for ApiResponse {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
