use std::any::Any;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::store::StoreError;

/// The primary error type for the application.
///
/// Every handler and middleware returns this; the `IntoResponse` impl is the only
/// place where HTTP status codes are chosen.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Storage or serialization failure, or a caught panic.
    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The target exists but is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation { field: field.to_string(), message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation { .. }
            | AppError::BadRequest(_)
            | AppError::InvalidState(_)
            | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Detail of an internal error, carried on the response extensions.
///
/// Never serialized by `AppError` itself; `expose_error_details` copies it into the
/// body when the server is not running in release mode.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail {
    pub error_id: String,
    pub detail: String,
}

pub fn error_body(status: StatusCode, code: &str, message: &str, details: Option<Value>) -> Value {
    let mut body = json!({
        "error": {
            "code": code,
            "message": message,
        },
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if let Some(details) = details {
        body["error"]["details"] = details;
    }
    body
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            AppError::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        };
        let (code, message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(error_id = %error_id, "Internal error: {:?}", e);
                let body = error_body(
                    status,
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    Some(json!({ "error_id": error_id })),
                );
                let mut res = (status, Json(body)).into_response();
                res.extensions_mut().insert(InternalErrorDetail { error_id, detail: format!("{:#}", e) });
                return res;
            }
            AppError::Validation { field, message } => (
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::InvalidState(msg) => ("INVALID_STATE", msg, None),
            AppError::Conflict(msg) => ("CONFLICT", msg, None),
            AppError::Unauthenticated(msg) => ("UNAUTHENTICATED", msg, None),
            AppError::Forbidden(msg) => ("FORBIDDEN", msg, None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::RateLimited { retry_after_seconds } => (
                "RATE_LIMITED",
                format!("Too many requests. Please retry after {} seconds", retry_after_seconds),
                Some(json!({ "retry_after_seconds": retry_after_seconds })),
            ),
        };

        let body = error_body(status, code, &message, details);
        let mut res = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("database error")),
            StoreError::Corrupt(msg) => AppError::Internal(anyhow::anyhow!("corrupt row: {}", msg)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("path", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text())
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// JSON body extractor whose rejection is an `AppError::Validation`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejection is an `AppError::Validation`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string extractor whose rejection is an `AppError::Validation`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Converts a panic payload caught by `CatchPanicLayer` into the standard 500 body.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(anyhow::anyhow!("request handler panicked: {}", detail)).into_response()
}

/// Debug-mode middleware: copies `InternalErrorDetail` into the JSON body of 500 responses.
///
/// Only layered when `server.mode` is not `release`.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let Some(info) = res.extensions_mut().remove::<InternalErrorDetail>() else {
        return res;
    };
    let status = res.status();
    let body = error_body(
        status,
        "INTERNAL_ERROR",
        "An internal server error occurred",
        Some(json!({ "error_id": info.error_id, "details": info.detail })),
    );
    (status, Json(body)).into_response()
}
