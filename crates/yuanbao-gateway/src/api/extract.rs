//! JSON body extractor with a validation-error response

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use super::error::{ApiError, FieldError};

/// Like [`axum::Json`], but rejects with [`ApiError::Validation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Validation {
                errors: vec![field_error(&rejection)],
            }),
        }
    }
}

/// Field location and message parsed out of axum's rejection text
///
/// Depends on the wording of axum's `JsonDataError` display:
/// "... target type: <path>: <serde message>". The wording is pinned by
/// `test_rejection_text_format` below.
fn field_error(rejection: &JsonRejection) -> FieldError {
    let text = rejection.body_text();
    let detail = text
        .split_once("target type: ")
        .map(|(_, rest)| rest)
        .unwrap_or(&text);

    // Data errors read "<path>: <message>" when the problem is nested
    let (path, msg) = match detail.split_once(": ") {
        Some((path, msg)) if !path.is_empty() && !path.contains(' ') => (Some(path), msg),
        _ => (None, detail),
    };

    let mut loc = vec!["body".to_string()];
    if let Some(path) = path {
        loc.extend(
            path.split(['.', '[', ']'])
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
    }

    let missing = missing_field(msg);
    if let Some(field) = missing {
        loc.push(field.to_string());
    }

    let kind = match rejection {
        _ if missing.is_some() => "missing",
        JsonRejection::JsonDataError(_) => "value_error",
        JsonRejection::JsonSyntaxError(_) => "json_invalid",
        JsonRejection::MissingJsonContentType(_) => "content_type",
        _ => "body_error",
    };

    FieldError {
        loc,
        msg: msg.to_string(),
        kind: kind.to_string(),
    }
}

/// Field name from serde's "missing field `name`" message
fn missing_field(msg: &str) -> Option<&str> {
    let rest = msg.split_once("missing field `")?.1;
    rest.split_once('`').map(|(field, _)| field)
}
