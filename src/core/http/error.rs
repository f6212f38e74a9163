//! HTTP error responses.
//!
//! Every failure surfaces as a JSON body of the form
//! `{"_status": "ERR", "_error": {"code", "message"}}`. Validation failures
//! instead carry the field-keyed issue map:
//! `{"_status": "ERR", "_issues": {field: message}}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

use crate::domains::resources::ResourceError;
use crate::domains::validation::Issues;

/// An HTTP-facing error carrying its response body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// Standard error body for a status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            body: json!({
                "_status": "ERR",
                "_error": {"code": status.as_u16(), "message": message}
            }),
        }
    }

    /// 404 with the standard body.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 400 with the standard body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 422 carrying a field-keyed issue map.
    pub fn unprocessable(issues: &Issues) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({"_status": "ERR", "_issues": issues}),
        }
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::UnknownResource(_) | ResourceError::DocumentNotFound(_) => {
                Self::not_found(err.to_string())
            }
            ResourceError::DuplicateEndpoint(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            ResourceError::MissingKeyField { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ResourceError::Validation(issues) => Self::unprocessable(&issues),
            ResourceError::Schema(_) | ResourceError::Store(_) => {
                error!("Internal failure while handling request: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
