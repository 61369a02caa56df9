//! Error types for importcheck-engine
//!
//! - [`ProcessorError`]: infrastructure faults raised by processor hooks
//! - [`PipelineError`]: faults raised by middleware stages or the dispatcher
//! - [`Fault`]: the normalized `{code, message}` shape the front-end sees
//! - [`ApiError`]: HTTP rendering of the above

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Fault raised by a processor hook
///
/// Business findings never travel through this type; they are reported in
/// [`crate::types::ValidationResult`].
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Query helper used before a data store was injected
    #[error("Processor '{0}' has no database connection")]
    NoDatabase(String),

    /// Data store refused or failed the statement
    #[error("Data store error: {0}")]
    DataStore(#[from] importcheck_common::Error),

    /// No processor registered under the requested id
    #[error("Validation processor not found: {0}")]
    NotFound(String),

    /// Any other processor-specific fault
    #[error("{0}")]
    Failed(String),
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Machine-readable fault codes
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const SCHEMA_VIOLATION: &str = "SCHEMA_VIOLATION";
    pub const SECURITY_VIOLATION: &str = "SECURITY_VIOLATION";
    pub const UNKNOWN_CHANNEL: &str = "UNKNOWN_CHANNEL";
    pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Normalized fault shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Fault raised inside the request pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Caller '{caller}' is not authenticated")]
    Unauthenticated { caller: String },

    #[error("Rate limit exceeded for '{channel}': max {max} requests per {window_ms}ms")]
    RateLimited {
        caller: String,
        channel: String,
        max: u32,
        window_ms: u64,
    },

    /// All missing fields are reported together
    #[error("Missing required fields: {}", .missing.join(", "))]
    SchemaViolation { missing: Vec<String> },

    #[error("Potentially malicious content rejected at '{path}'")]
    SecurityViolation { path: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Already reshaped by the error normalization stage
    #[error("{}", .0.message)]
    Normalized(Fault),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn code(&self) -> &str {
        match self {
            PipelineError::Unauthenticated { .. } => codes::UNAUTHENTICATED,
            PipelineError::RateLimited { .. } => codes::RATE_LIMITED,
            PipelineError::SchemaViolation { .. } => codes::SCHEMA_VIOLATION,
            PipelineError::SecurityViolation { .. } => codes::SECURITY_VIOLATION,
            PipelineError::UnknownChannel(_) => codes::UNKNOWN_CHANNEL,
            PipelineError::InvalidArguments(_) => codes::INVALID_ARGUMENTS,
            PipelineError::Normalized(fault) => &fault.code,
            PipelineError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn to_fault(&self) -> Fault {
        match self {
            PipelineError::Normalized(fault) => fault.clone(),
            other => Fault::new(other.code(), other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::InvalidArguments(err.to_string())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be read as an invocation
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Fault raised by the pipeline
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

fn status_for(code: &str) -> StatusCode {
    match code {
        codes::UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
        codes::RATE_LIMITED => StatusCode::TOO_MANY_REQUESTS,
        codes::SCHEMA_VIOLATION | codes::INVALID_ARGUMENTS => StatusCode::BAD_REQUEST,
        codes::SECURITY_VIOLATION => StatusCode::UNPROCESSABLE_ENTITY,
        codes::UNKNOWN_CHANNEL => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let fault = match self {
            ApiError::BadRequest(msg) => Fault::new("BAD_REQUEST", msg),
            ApiError::Pipeline(ref err) => err.to_fault(),
        };
        let status = if fault.code == "BAD_REQUEST" {
            StatusCode::BAD_REQUEST
        } else {
            status_for(&fault.code)
        };

        let body = Json(json!({
            "error": {
                "code": fault.code,
                "message": fault.message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
