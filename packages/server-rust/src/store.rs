//! In-memory tables and blobs behind the REST routes.
//!
//! Each table is a `DashMap` entry holding its rows in insertion order.
//! Operations on different tables never contend; operations on one table
//! are serialized by the entry's shard lock.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use dashmap::DashMap;
use folio_core::{Direction, ID_COLUMN, RESERVED_PARAMS};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// A stored row.
pub type Row = Map<String, Value>;

/// Column stamped on every write.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Failures of table and blob operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("row `{id}` not found in `{table}`")]
    NotFound { table: String, id: String },
    #[error("row `{id}` already exists in `{table}`")]
    Conflict { table: String, id: String },
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("invalid query parameter `{param}`: {reason}")]
    InvalidQuery { param: String, reason: String },
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
}

/// Read parameters of `GET /db/{table}`.
///
/// The names in [`RESERVED_PARAMS`] are controls; every other parameter is
/// an equality filter. Clients refuse to send a filter on a reserved name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub columns: Option<Vec<String>>,
}

impl ListQuery {
    /// Parses query-string pairs.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidQuery`] for a non-numeric `limit` or an
    /// `order_dir` other than `asc`/`desc`.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, StoreError> {
        let mut query = Self::default();
        let mut order_by = None;
        let mut direction = Direction::Asc;
        for (key, value) in pairs {
            match key.as_str() {
                "limit" => {
                    let limit = value.parse().map_err(|_| StoreError::InvalidQuery {
                        param: key.clone(),
                        reason: format!("`{value}` is not a non-negative integer"),
                    })?;
                    query.limit = Some(limit);
                }
                "order_by" => order_by = Some(value),
                "order_dir" => {
                    direction = match value.as_str() {
                        "asc" => Direction::Asc,
                        "desc" => Direction::Desc,
                        _ => {
                            return Err(StoreError::InvalidQuery {
                                param: key,
                                reason: format!("expected `asc` or `desc`, got `{value}`"),
                            })
                        }
                    };
                }
                "select" => {
                    let columns: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_owned)
                        .collect();
                    if !columns.is_empty() && !columns.iter().any(|c| c == "*") {
                        query.columns = Some(columns);
                    }
                }
                _ => query.filters.push((key, value)),
            }
        }
        query.order = order_by.map(|column| (column, direction));
        Ok(query)
    }
}

/// Query-string form of a stored value, used for filters and id lookup.
fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_id(row: &Row) -> Option<String> {
    row.get(ID_COLUMN).filter(|v| !v.is_null()).map(text_form)
}

fn matches(row: &Row, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expected)| {
        row.get(column)
            .is_some_and(|value| text_form(value) == *expected)
    })
}

/// Total order over JSON scalars: null < bool < number < string < other.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn project(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        None => row.clone(),
        Some(columns) => columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Named collections of JSON rows.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: DashMap<String, Vec<Row>>,
}

impl TableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables that have received at least one row.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Rows of `table` matching `query`. An unknown table has no rows.
    #[must_use]
    pub fn list(&self, table: &str, query: &ListQuery) -> Vec<Row> {
        let Some(rows) = self.tables.get(table) else {
            return Vec::new();
        };
        let mut selected: Vec<&Row> = rows
            .iter()
            .filter(|row| matches(row, &query.filters))
            .collect();
        if let Some((column, direction)) = &query.order {
            selected.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        selected
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| project(row, query.columns.as_deref()))
            .collect()
    }

    #[must_use]
    pub fn get(&self, table: &str, id: &str) -> Option<Row> {
        self.tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row_id(row).as_deref() == Some(id))
                .cloned()
        })
    }

    /// Appends `body` to `table`, assigning a UUID v4 `id` when it has none.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotAnObject`] for a non-object body and
    /// [`StoreError::Conflict`] when the id is already taken.
    pub fn insert(&self, table: &str, body: Value) -> Result<Row, StoreError> {
        let Value::Object(mut row) = body else {
            return Err(StoreError::NotAnObject);
        };
        let id = match row_id(&row) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                row.insert(ID_COLUMN.to_string(), Value::String(id.clone()));
                id
            }
        };
        row.insert(UPDATED_AT_COLUMN.to_string(), now_ms().into());

        let mut rows = self.tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| row_id(r).as_deref() == Some(id.as_str())) {
            return Err(StoreError::Conflict {
                table: table.to_string(),
                id,
            });
        }
        rows.push(row.clone());
        debug!(table, id = %id, "row inserted");
        Ok(row)
    }

    /// Shallow-merges `patch` into row `id`. The id itself never changes.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotAnObject`] for a non-object patch and
    /// [`StoreError::NotFound`] for an unknown id.
    pub fn update(&self, table: &str, id: &str, patch: Value) -> Result<Row, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::NotAnObject);
        };
        let not_found = || StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };
        let mut rows = self.tables.get_mut(table).ok_or_else(not_found)?;
        let row = rows
            .iter_mut()
            .find(|row| row_id(row).as_deref() == Some(id))
            .ok_or_else(not_found)?;
        for (column, value) in patch {
            if column != ID_COLUMN {
                row.insert(column, value);
            }
        }
        row.insert(UPDATED_AT_COLUMN.to_string(), now_ms().into());
        debug!(table, id, "row updated");
        Ok(row.clone())
    }

    /// Removes row `id` and returns it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown id.
    pub fn delete(&self, table: &str, id: &str) -> Result<Row, StoreError> {
        let not_found = || StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };
        let mut rows = self.tables.get_mut(table).ok_or_else(not_found)?;
        let index = rows
            .iter()
            .position(|row| row_id(row).as_deref() == Some(id))
            .ok_or_else(not_found)?;
        debug!(table, id, "row deleted");
        Ok(rows.remove(index))
    }
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub data: Bytes,
}

/// Uploaded objects keyed by bucket and path.
#[derive(Debug, Default)]
pub struct BlobStore {
    objects: DashMap<(String, String), Blob>,
}

/// Normalizes an object path, refusing empty paths and `.`/`..` segments.
fn normalize_path(path: &str) -> Result<String, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}

impl BlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Stores `blob`, replacing any previous object, and returns the
    /// normalized path.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPath`] for an empty or traversing path.
    pub fn put(&self, bucket: &str, path: &str, blob: Blob) -> Result<String, StoreError> {
        let path = normalize_path(path)?;
        debug!(bucket, path = %path, bytes = blob.data.len(), "object stored");
        self.objects
            .insert((bucket.to_string(), path.clone()), blob);
        Ok(path)
    }

    /// # Errors
    ///
    /// [`StoreError::InvalidPath`] or [`StoreError::ObjectNotFound`].
    pub fn get(&self, bucket: &str, path: &str) -> Result<Blob, StoreError> {
        let path = normalize_path(path)?;
        self.objects
            .get(&(bucket.to_string(), path.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::ObjectNotFound(format!("{bucket}/{path}")))
    }
}
