use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::model::ValidationError;
use crate::store::StoreError;

/// JSON error reply: `{"error": message, "code": code, "details"?: ...}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub fn err(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> ApiError {
    ApiError {
        status,
        code,
        message: message.into(),
        details,
    }
}

impl ApiError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        err(StatusCode::BAD_REQUEST, "bad_params", message, None)
    }

    pub fn student_not_found() -> Self {
        err(StatusCode::NOT_FOUND, "not_found", "Student not found", None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        err(StatusCode::INTERNAL_SERVER_ERROR, "internal", message, None)
    }

    /// `code` names the failed operation (`db_query_failed`, `db_insert_failed`, ...)
    /// and is only used when the store itself broke.
    pub fn store(e: StoreError, code: &'static str) -> Self {
        match e {
            StoreError::Duplicate { field } => {
                warn!(field = field.as_str(), "duplicate student rejected");
                err(
                    StatusCode::BAD_REQUEST,
                    "duplicate",
                    e.to_string(),
                    Some(json!({ "field": field.as_str() })),
                )
            }
            StoreError::UnknownCourse(id) => err(
                StatusCode::BAD_REQUEST,
                "bad_params",
                "Unknown course",
                Some(json!({ "courseId": id })),
            ),
            StoreError::Poisoned | StoreError::Db(_) => {
                error!(error = %e, code, "store failure");
                err(StatusCode::INTERNAL_SERVER_ERROR, code, "Database error", None)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        let details = match &e {
            ValidationError::MissingFields(fields) => Some(json!({ "missing": fields })),
            _ => None,
        };
        err(StatusCode::BAD_REQUEST, "bad_params", e.to_string(), details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
        });
        if let Some(d) = self.details {
            body["details"] = d;
        }
        (self.status, Json(body)).into_response()
    }
}
