//! Typed errors and HTTP mapping.

use crate::response::error_body;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stable numeric codes carried in the error envelope. Part of the wire contract.
pub mod codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const UNAUTHENTICATED: u32 = 401;
    pub const NOT_FOUND: u32 = 404;
    pub const PAYLOAD_TOO_LARGE: u32 = 413;
    pub const INTERNAL: u32 = 500;
    pub const FORBIDDEN: u32 = 5000;
    pub const EMPTY_PAYLOAD: u32 = 5100;
    pub const VALIDATION: u32 = 5101;
    pub const DELETE_FAILED: u32 = 5102;
    pub const UPLOAD_REJECTED: u32 = 5103;
    pub const CONFIG: u32 = 5900;
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("resource '{0}' has no model binding")]
    MissingModel(String),
    #[error("unknown resource scope: {0}")]
    UnknownScope(String),
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),
    #[error("resource '{scope}' is bound to unregistered controller '{controller}'")]
    UnknownController { scope: String, controller: String },
    #[error("resource '{scope}' uses unregistered serializer '{serializer}'")]
    UnknownSerializer { scope: String, serializer: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Per-field validation messages, keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise `ApiError::Validation`.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid directive: {0}")]
    InvalidDirective(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("empty payload")]
    EmptyPayload,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("delete failed")]
    DeleteFailed,
    #[error("storage constraint {code}: {message}")]
    StorageConstraint { code: String, message: String },
    #[error("upload rejected for '{field}': {reason}")]
    UploadRejected { field: String, reason: String },
    /// Domain error returned by a hook. Code and extra detail pass through untouched.
    #[error("{message}")]
    Domain {
        code: u32,
        message: String,
        extra: Option<Value>,
    },
    #[error("storage: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn invalid_directive(msg: impl Into<String>) -> Self {
        Self::InvalidDirective(msg.into())
    }

    pub fn domain(code: u32, message: impl Into<String>) -> Self {
        Self::Domain {
            code,
            message: message.into(),
            extra: None,
        }
    }

    /// Extractor rejection: body limit overruns keep their 413, the rest are bad requests.
    pub fn rejection(status: StatusCode, text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(text)
        }
    }

    /// Envelope code. Storage constraint codes pass through from the engine (numeric when they parse).
    pub fn code(&self) -> Value {
        let n = match self {
            ApiError::Config(_) => codes::CONFIG,
            ApiError::InvalidDirective(_) | ApiError::BadRequest(_) => codes::BAD_REQUEST,
            ApiError::Unauthenticated => codes::UNAUTHENTICATED,
            ApiError::Forbidden(_) => codes::FORBIDDEN,
            ApiError::NotFound(_) => codes::NOT_FOUND,
            ApiError::EmptyPayload => codes::EMPTY_PAYLOAD,
            ApiError::PayloadTooLarge => codes::PAYLOAD_TOO_LARGE,
            ApiError::Validation(_) => codes::VALIDATION,
            ApiError::DeleteFailed => codes::DELETE_FAILED,
            ApiError::UploadRejected { .. } => codes::UPLOAD_REJECTED,
            ApiError::Domain { code, .. } => *code,
            ApiError::Storage(_) => codes::INTERNAL,
            ApiError::StorageConstraint { code, .. } => {
                return code
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(code.clone()));
            }
        };
        Value::from(n)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidDirective(_) | ApiError::BadRequest(_) | ApiError::EmptyPayload => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Validation(_) | ApiError::UploadRejected { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::DeleteFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::StorageConstraint { .. } => StatusCode::CONFLICT,
            ApiError::Domain { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Structured detail merged into the error envelope.
    pub fn extra(&self) -> Option<Value> {
        match self {
            ApiError::Validation(errors) => Some(serde_json::json!({ "validation": errors })),
            ApiError::Domain { extra, .. } => extra.clone(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ApiError::NotFound("record".into()),
            sqlx::Error::Database(db) => match db.code() {
                // SQLSTATE class 23: integrity constraint violation
                Some(code) if code.starts_with("23") => ApiError::StorageConstraint {
                    code: code.into_owned(),
                    message: db.message().to_string(),
                },
                _ => ApiError::Storage(e.to_string()),
            },
            _ => ApiError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = error_body(self.code(), self.to_string(), self.extra());
        (status, Json(body)).into_response()
    }
}
