//! Error taxonomy shared by every backend call.
//!
//! Failures fall into four kinds: no response at all, an invalid session,
//! bad input (caught locally or reported field-by-field by the server), and
//! a well-formed request the backend refused.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const NETWORK_MESSAGE: &str =
    "Unable to connect to the server. Please check your internet connection.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Authentication,
    Validation,
    BusinessRule,
}

/// One field-level complaint, from local checks or the server's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerFieldError {
    #[serde(default)]
    msg: String,
    #[serde(default, alias = "path")]
    param: String,
}

/// Error body as the backend sent it. The raw JSON is kept untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorPayload {
    pub message: Option<String>,
    pub suggest_login: bool,
    pub duplicate_type: Option<String>,
    pub raw: Value,
}

impl ErrorPayload {
    pub fn from_body(body: &[u8]) -> Self {
        let raw: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let suggest_login = raw
            .get("suggestLogin")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let duplicate_type = raw
            .get("duplicateType")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            message,
            suggest_login,
            duplicate_type,
            raw,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            raw: serde_json::json!({ "success": false, "message": message.clone() }),
            message: Some(message),
            ..Self::default()
        }
    }

    pub fn field_errors(&self) -> Option<ValidationErrors> {
        let entries = self.raw.get("errors")?;
        let parsed: Vec<ServerFieldError> = serde_json::from_value(entries.clone()).ok()?;
        if parsed.is_empty() {
            return None;
        }
        Some(ValidationErrors {
            errors: parsed
                .into_iter()
                .map(|e| FieldError::new(e.param, e.msg))
                .collect(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network failure: {message}")]
    Network { message: String },

    #[error("session is not authenticated")]
    Unauthorized,

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("request rejected with status {status}: {}", .payload.message.as_deref().unwrap_or("no message"))]
    Rejected { status: u16, payload: ErrorPayload },

    #[error("unexpected response body: {message}")]
    Decode { message: String },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Unauthorized | ApiError::Rejected { status: 401, .. } => {
                ErrorKind::Authentication
            }
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Rejected { payload, .. } if payload.field_errors().is_some() => {
                ErrorKind::Validation
            }
            ApiError::Rejected { .. } | ApiError::Decode { .. } => ErrorKind::BusinessRule,
        }
    }

    /// True for the global 401 and for a 401 answered by an auth endpoint.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::Rejected { status: 401, .. }
        )
    }

    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            ApiError::Rejected { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Message safe to put in front of a user.
    pub fn user_message(&self, default: &str) -> String {
        match self {
            ApiError::Network { .. } => NETWORK_MESSAGE.to_string(),
            ApiError::Validation(errors) => errors
                .first_message()
                .map(str::to_string)
                .unwrap_or_else(|| default.to_string()),
            ApiError::Rejected { payload, .. } => payload
                .message
                .clone()
                .or_else(|| {
                    payload
                        .field_errors()
                        .and_then(|errors| errors.first_message().map(str::to_string))
                })
                .unwrap_or_else(|| default.to_string()),
            ApiError::Unauthorized | ApiError::Decode { .. } => default.to_string(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}
