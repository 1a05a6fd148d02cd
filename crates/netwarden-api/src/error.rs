//! Maps the shared `Error` taxonomy onto HTTP status codes (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use netwarden_core::Error;
use serde_json::json;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Error::Discovery(_)
            | Error::TransientSubprocess(_)
            | Error::SubprocessTimeout(_)
            | Error::Parse(_)
            | Error::Store(_)
            | Error::StuckScanTimeout(_)
            | Error::Config(_)
            | Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
        };
        (status, Json(json!({ "detail": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
