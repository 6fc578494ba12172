//! HTTP-facing errors
//!
//! Most failures on the chat endpoints are answered with status 200 and the
//! error text as assistant content. The variants here are the exceptions.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

const VALIDATION_DETAIL: &str = "请求参数验证失败";
const VALIDATION_HINT: &str = "请检查请求格式是否正确，确保包含所有必填字段";

/// One problem found while validating a request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending value, starting with `"body"`
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not JSON or does not match the request schema (422)
    #[error("request validation failed")]
    Validation { errors: Vec<FieldError> },

    /// Semantically unusable request (400)
    #[error("{detail}")]
    BadRequest { detail: String },

    /// Model is not in the catalog (400)
    #[error("The model '{0}' does not exist")]
    ModelNotFound(String),
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    detail: &'static str,
    errors: &'a [FieldError],
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation { errors } => {
                tracing::warn!("Rejected request body: {:?}", errors);
                let body = ValidationBody {
                    detail: VALIDATION_DETAIL,
                    errors,
                    message: VALIDATION_HINT,
                };
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            ApiError::BadRequest { detail } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::ModelNotFound(_) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": {
                        "type": "model_not_found",
                        "message": self.to_string(),
                    }
                })),
            )
                .into_response(),
        }
    }
}
