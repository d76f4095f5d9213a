//! `/db/{table}` and `/db/{table}/{id}` row endpoints.
//!
//! Every response body is `{ "data": ... }` or `{ "error": "..." }`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use folio_core::ResponseBody;
use serde_json::Value;

use super::AppState;
use crate::error::ApiError;
use crate::store::{ListQuery, Row};

fn row_body(row: Row) -> Json<ResponseBody> {
    Json(ResponseBody::data(Value::Object(row)))
}

/// `GET /db/{table}`: rows as an array, possibly empty.
pub async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ResponseBody>, ApiError> {
    let query = ListQuery::from_pairs(params)?;
    let rows = state.tables.list(&table, &query);
    Ok(Json(ResponseBody::data(Value::Array(
        rows.into_iter().map(Value::Object).collect(),
    ))))
}

/// `POST /db/{table}`: 201 with the stored row, 409 on a taken id.
pub async fn insert_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ResponseBody>), ApiError> {
    let Json(body) = body?;
    let row = state.tables.insert(&table, body)?;
    Ok((StatusCode::CREATED, row_body(row)))
}

/// `PUT /db/{table}/{id}`: merges the body into an existing row, 404 when
/// there is none.
pub async fn update_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ResponseBody>, ApiError> {
    let Json(patch) = body?;
    Ok(row_body(state.tables.update(&table, &id, patch)?))
}

/// `DELETE /db/{table}/{id}`: the removed row.
pub async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<ResponseBody>, ApiError> {
    Ok(row_body(state.tables.delete(&table, &id)?))
}
