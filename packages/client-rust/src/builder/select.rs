use std::future::IntoFuture;
use std::marker::PhantomData;

use folio_core::{Envelope, QueryDescriptor, Record, ShimError};
use http::Method;
use serde_json::Value;

use super::ShimFuture;
use crate::db::Db;
use crate::exec::{decode_row, decode_rows, execute, CallOptions};
use crate::transport::ApiRequest;

/// Read chain: `select().eq(..).order(..).limit(..)`.
///
/// Resolves to every matching row; an empty match is `data: Some(vec![])`.
#[must_use = "a query does nothing until awaited"]
pub struct SelectQuery<T> {
    db: Db,
    desc: QueryDescriptor,
    pub(super) opts: CallOptions,
    _row: PhantomData<fn() -> T>,
}

impl<T> Clone for SelectQuery<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            desc: self.desc.clone(),
            opts: self.opts.clone(),
            _row: PhantomData,
        }
    }
}

impl<T: Record> SelectQuery<T> {
    pub(crate) fn new(db: Db, desc: QueryDescriptor) -> Self {
        let opts = db.read_options();
        Self {
            db,
            desc,
            opts,
            _row: PhantomData,
        }
    }

    /// Equality filter. Only one filter is supported: a second `eq`
    /// replaces the first. Filtering on `limit`, `order_by`, `order_dir` or
    /// `select` resolves to [`ShimError::ReservedColumn`] without a request.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.desc = self.desc.with_filter(column, value);
        self
    }

    /// Sort key. Only one is supported: a second `order` replaces the first.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.desc = self.desc.with_order(column, ascending);
        self
    }

    /// Row cap, passed through unchecked.
    pub fn limit(mut self, limit: u64) -> Self {
        self.desc = self.desc.with_limit(limit);
        self
    }

    /// Expect at most one row. Zero rows resolve to `data: None` without
    /// an error.
    pub fn single(self) -> SingleQuery<T> {
        SingleQuery {
            db: self.db,
            desc: self.desc.into_single(),
            opts: self.opts,
            _row: PhantomData,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.desc
    }
}

/// Read chain narrowed by [`SelectQuery::single`].
#[must_use = "a query does nothing until awaited"]
pub struct SingleQuery<T> {
    db: Db,
    desc: QueryDescriptor,
    pub(super) opts: CallOptions,
    _row: PhantomData<fn() -> T>,
}

impl<T: Record> SingleQuery<T> {
    /// Equality filter, replacing any previous one.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.desc = self.desc.with_filter(column, value);
        self
    }

    /// Sort key, replacing any previous one.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.desc = self.desc.with_order(column, ascending);
        self
    }

    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.desc
    }
}

async fn fetch(db: &Db, desc: &QueryDescriptor, opts: &CallOptions) -> Result<Option<Value>, ShimError> {
    let request =
        ApiRequest::collection(Method::GET, desc.table()).with_query(desc.query_pairs()?);
    Ok(execute(db.transport(), request, opts).await?.data)
}

impl<T: Record> IntoFuture for SelectQuery<T> {
    type Output = Envelope<Vec<T>>;
    type IntoFuture = ShimFuture<Vec<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = match fetch(&self.db, &self.desc, &self.opts).await {
                Ok(data) => decode_rows(data),
                Err(err) => Err(err),
            };
            Envelope::from(result)
        })
    }
}

impl<T: Record> IntoFuture for SingleQuery<T> {
    type Output = Envelope<T>;
    type IntoFuture = ShimFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = match fetch(&self.db, &self.desc, &self.opts).await {
                Ok(data) => decode_row(data),
                Err(err) => Err(err),
            };
            Envelope::from_optional(result)
        })
    }
}
