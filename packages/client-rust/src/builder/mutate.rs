use std::future::IntoFuture;
use std::marker::PhantomData;

use folio_core::{mutation_target, Envelope, Filter, Patch, Record, ShimError, ID_COLUMN};
use http::Method;
use serde_json::Value;

use super::ShimFuture;
use crate::db::Db;
use crate::exec::{decode_row, execute, CallOptions};
use crate::transport::ApiRequest;

fn filter(column: impl Into<String>, value: impl ToString) -> Filter {
    Filter {
        column: column.into(),
        value: value.to_string(),
    }
}

/// Partial update of one row, addressed by primary key.
///
/// The row must be picked with `.eq("id", v)` or `.match_id(v)`. Without a
/// filter the update resolves to "Column filter required for update"; with a
/// filter on any other column it resolves to
/// [`ShimError::UnsupportedFilter`]. Neither case touches the network.
///
/// Resolves to the updated row, or `data: None` when the endpoint does not
/// echo it.
#[must_use = "a query does nothing until awaited"]
pub struct UpdateQuery<T> {
    db: Db,
    table: String,
    patch: Result<Patch, ShimError>,
    filter: Option<Filter>,
    pub(super) opts: CallOptions,
    _row: PhantomData<fn() -> T>,
}

impl<T: Record> UpdateQuery<T> {
    pub(crate) fn new(db: Db, table: String, patch: Result<Patch, ShimError>) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            patch,
            filter: None,
            opts,
            _row: PhantomData,
        }
    }

    /// Target filter. Only `id` is accepted at execution time.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter = Some(filter(column, value));
        self
    }

    /// Targets the row whose primary key is `id`.
    pub fn match_id(self, id: impl ToString) -> Self {
        self.eq(ID_COLUMN, id)
    }
}

impl<T: Record> IntoFuture for UpdateQuery<T> {
    type Output = Envelope<T>;
    type IntoFuture = ShimFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = async {
                let id = mutation_target(self.filter.as_ref(), "update")?;
                let patch = self.patch?;
                let request =
                    ApiRequest::row(Method::PUT, &self.table, id).with_json(Value::Object(patch));
                decode_row(execute(self.db.transport(), request, &self.opts).await?.data)
            }
            .await;
            Envelope::from_optional(result)
        })
    }
}

/// Deletes one row, addressed by primary key, with the same filter rules
/// as [`UpdateQuery`]. Resolves to the deleted row when the endpoint
/// echoes it.
#[must_use = "a query does nothing until awaited"]
pub struct DeleteQuery<T> {
    db: Db,
    table: String,
    filter: Option<Filter>,
    pub(super) opts: CallOptions,
    _row: PhantomData<fn() -> T>,
}

impl<T: Record> DeleteQuery<T> {
    pub(crate) fn new(db: Db, table: String) -> Self {
        let opts = db.write_options();
        Self {
            db,
            table,
            filter: None,
            opts,
            _row: PhantomData,
        }
    }

    /// Target filter. Only `id` is accepted at execution time.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter = Some(filter(column, value));
        self
    }

    /// Targets the row whose primary key is `id`.
    pub fn match_id(self, id: impl ToString) -> Self {
        self.eq(ID_COLUMN, id)
    }
}

impl<T: Record> IntoFuture for DeleteQuery<T> {
    type Output = Envelope<T>;
    type IntoFuture = ShimFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = async {
                let id = mutation_target(self.filter.as_ref(), "delete")?;
                let request = ApiRequest::row(Method::DELETE, &self.table, id);
                decode_row(execute(self.db.transport(), request, &self.opts).await?.data)
            }
            .await;
            Envelope::from_optional(result)
        })
    }
}
