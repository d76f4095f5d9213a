//! HTTP error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_core::ResponseBody;
use thiserror::Error;
use tracing::warn;

use crate::store::StoreError;

/// A failed request, rendered as a status code and `{ "error": message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid JSON body: {0}")]
    BadJson(String),
    #[error("server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::NotFound { .. } | StoreError::ObjectNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            Self::Store(
                StoreError::NotAnObject
                | StoreError::InvalidQuery { .. }
                | StoreError::InvalidPath(_),
            )
            | Self::BadJson(_) => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadJson(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(ResponseBody::error(self.to_string()))).into_response()
    }
}
