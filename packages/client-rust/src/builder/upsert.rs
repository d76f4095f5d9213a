use std::future::IntoFuture;

use folio_core::{to_object, Envelope, Record, ShimError};
use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use super::insert::post_row;
use super::ShimFuture;
use crate::db::Db;
use crate::exec::{decode_row, execute, CallOptions};
use crate::transport::ApiRequest;

/// `PUT` when the row has an id, falling back to `POST` if the server
/// refuses it.
///
/// Only an application error triggers the fallback. After a transport
/// failure, timeout or cancellation the `PUT` may still have been applied,
/// so that error is returned as is.
async fn upsert_row<T: Record>(
    db: &Db,
    table: &str,
    row: T,
    opts: &CallOptions,
) -> Result<T, ShimError> {
    let Some(id) = row.id().map(str::to_owned) else {
        return post_row(db, table, row, opts).await;
    };
    let body = to_object(&row).map_err(ShimError::encode)?;
    let request = ApiRequest::row(Method::PUT, table, &id).with_json(Value::Object(body));
    let updated = match execute(db.transport(), request, opts).await {
        Ok(response) => decode_row(response.data),
        Err(err) => Err(err),
    };
    match updated {
        Ok(stored) => Ok(stored.unwrap_or(row)),
        Err(err @ ShimError::Application { .. }) => {
            debug!(table, id = %id, error = %err, "put refused, inserting instead");
            post_row(db, table, row, opts).await
        }
        Err(err) => Err(err),
    }
}

async fn upsert_rows<T: Record>(
    db: &Db,
    table: &str,
    rows: Vec<T>,
    opts: &CallOptions,
) -> Result<Vec<T>, ShimError> {
    let mut stored = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let row = upsert_row(db, table, row, opts).await.inspect_err(|err| {
            warn!(
                table,
                index,
                committed = stored.len(),
                error = %err,
                "upsert stopped; earlier rows remain stored"
            );
        })?;
        stored.push(row);
    }
    Ok(stored)
}

/// Single-row upsert. Resolves to the stored row.
#[must_use = "a query does nothing until awaited"]
pub struct UpsertQuery<T> {
    db: Db,
    table: String,
    rows: Vec<T>,
    pub(super) opts: CallOptions,
}

impl<T: Record> UpsertQuery<T> {
    pub(crate) fn new(db: Db, table: String, rows: Vec<T>) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            rows,
            opts,
        }
    }
}

/// Multi-row upsert, one row at a time in order, stopping at the first
/// failure.
#[must_use = "a query does nothing until awaited"]
pub struct UpsertManyQuery<T> {
    db: Db,
    table: String,
    rows: Vec<T>,
    pub(super) opts: CallOptions,
}

impl<T: Record> UpsertManyQuery<T> {
    pub(crate) fn new(db: Db, table: String, rows: Vec<T>) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            rows,
            opts,
        }
    }

    /// Still writes every row, but resolves to the first one only.
    pub fn single(self) -> UpsertQuery<T> {
        UpsertQuery {
            db: self.db,
            table: self.table,
            rows: self.rows,
            opts: self.opts,
        }
    }
}

impl<T: Record> IntoFuture for UpsertQuery<T> {
    type Output = Envelope<T>;
    type IntoFuture = ShimFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = upsert_rows(&self.db, &self.table, self.rows, &self.opts)
                .await
                .map(|rows| rows.into_iter().next());
            Envelope::from_optional(result)
        })
    }
}

impl<T: Record> IntoFuture for UpsertManyQuery<T> {
    type Output = Envelope<Vec<T>>;
    type IntoFuture = ShimFuture<Vec<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            Envelope::from(upsert_rows(&self.db, &self.table, self.rows, &self.opts).await)
        })
    }
}
