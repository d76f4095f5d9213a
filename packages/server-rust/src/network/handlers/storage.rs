//! `/storage/{bucket}/{*path}` object endpoints.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_core::ResponseBody;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;
use crate::store::Blob;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /storage/{bucket}/{*path}`: stores the raw body and answers
/// `{ "data": { "path", "url" } }`.
pub async fn upload_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ResponseBody>), ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let path = state.blobs.put(
        &bucket,
        &path,
        Blob {
            content_type,
            data: body,
        },
    )?;
    let url = state.config.object_url(&bucket, &path);
    Ok((
        StatusCode::CREATED,
        Json(ResponseBody::data(json!({ "path": path, "url": url }))),
    ))
}

/// `GET /storage/{bucket}/{*path}`: the stored bytes with their content type.
pub async fn download_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let blob = state.blobs.get(&bucket, &path)?;
    Ok(([(CONTENT_TYPE, blob.content_type)], blob.data).into_response())
}
