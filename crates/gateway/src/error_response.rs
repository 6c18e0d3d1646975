//! The one place in this workspace that turns a [`dr_domain::Error`]
//! into an HTTP status code and JSON body. No other layer should
//! reference a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dr_domain::Error;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reasons: Vec<String>,
}

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let reasons = match &self.0 {
            Error::UnprocessableEntity { reasons } => reasons.clone(),
            _ => Vec::new(),
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "internal error");
        } else {
            tracing::warn!(error = %self.0, kind, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: kind,
                detail: self.0.to_string(),
                reasons,
            }),
        )
            .into_response()
    }
}
