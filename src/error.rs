//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::contract::Capability;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("invalid DATABASE_URL: {0}")]
    DatabaseUrl(String),
}

#[derive(Error, Debug)]
pub enum CrudError {
    /// The model type cannot serve every capability the CRUD functions rely on.
    #[error("{model} is not a usable asset, missing: {}", format_missing(.missing))]
    NotAnAsset {
        model: &'static str,
        missing: Vec<Capability>,
    },
    /// Keyword arguments do not have the shape an operation requires.
    #[error("malformed arguments: {0}")]
    Shape(String),
    #[error("unknown lifecycle event: '{0}'")]
    UnknownEvent(String),
    #[error("callback rejected {event}: {message}")]
    Callback { event: String, message: String },
    #[error("session: {0}")]
    Session(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrudError {
    pub fn shape(message: impl Into<String>) -> Self {
        CrudError::Shape(message.into())
    }
}

fn format_missing(missing: &[Capability]) -> String {
    missing
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            CrudError::NotAnAsset { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "not_an_asset"),
            CrudError::Shape(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            CrudError::UnknownEvent(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unknown_event"),
            CrudError::Callback { .. } => (StatusCode::BAD_REQUEST, "callback_rejected"),
            CrudError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
            CrudError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            CrudError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            CrudError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_json"),
        };
        let details = match &self {
            CrudError::NotAnAsset { missing, .. } => Some(serde_json::json!(missing
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>())),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
