//! Entry point of the shim: `db.from::<T>()` / `db.table(name)`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use folio_core::{to_object, Patch, QueryDescriptor, Record, ShimError, Table};
use serde::Serialize;

use crate::builder::{
    DeleteQuery, InsertManyQuery, InsertQuery, SelectQuery, UpdateQuery, UpsertManyQuery,
    UpsertQuery,
};
use crate::config::ClientConfig;
use crate::exec::CallOptions;
use crate::transport::{HttpTransport, Transport};

struct DbInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

/// Handle to the REST data endpoint. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("base_url", &self.inner.config.base_url)
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Connects over HTTP to `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn connect(config: ClientConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Connects using [`ClientConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid settings.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::connect(ClientConfig::from_env()?)
    }

    /// Uses a caller-supplied transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(DbInner { transport, config }),
        }
    }

    /// Typed handle for the table `T` is bound to.
    #[must_use]
    pub fn from<T: Table>(&self) -> TableHandle<T> {
        self.table(T::NAME)
    }

    /// Handle for an arbitrary table name.
    ///
    /// The name is not validated; it becomes one URL path segment.
    #[must_use]
    pub fn table<R: Record>(&self, name: impl Into<String>) -> TableHandle<R> {
        TableHandle {
            db: self.clone(),
            table: name.into(),
            _row: PhantomData,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn read_options(&self) -> CallOptions {
        let config = &self.inner.config;
        CallOptions {
            timeout: config.request_timeout,
            cancel: None,
            retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }

    pub(crate) fn write_options(&self) -> CallOptions {
        self.read_options().without_retries()
    }
}

/// Operations on one remote collection.
pub struct TableHandle<T> {
    db: Db,
    table: String,
    _row: PhantomData<fn() -> T>,
}

impl<T> Clone for TableHandle<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table.clone(),
            _row: PhantomData,
        }
    }
}

impl<T: Record> TableHandle<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.table
    }

    /// Read chain over every column.
    #[must_use]
    pub fn select(&self) -> SelectQuery<T> {
        SelectQuery::new(self.db.clone(), QueryDescriptor::new(&self.table))
    }

    /// Read chain with a column projection, e.g. `"id,title"`.
    #[must_use]
    pub fn select_columns(&self, columns: impl Into<String>) -> SelectQuery<T> {
        SelectQuery::new(
            self.db.clone(),
            QueryDescriptor::new(&self.table).with_columns(columns),
        )
    }

    /// Inserts one row; resolves to the stored row.
    #[must_use]
    pub fn insert(&self, row: T) -> InsertQuery<T> {
        InsertQuery::new(self.db.clone(), self.table.clone(), vec![row])
    }

    /// Inserts rows one request at a time, in order. A failure stops the
    /// sequence; rows already stored stay stored.
    #[must_use]
    pub fn insert_many(&self, rows: Vec<T>) -> InsertManyQuery<T> {
        InsertManyQuery::new(self.db.clone(), self.table.clone(), rows)
    }

    /// Partial update of the row picked by `.eq("id", ..)` or `.match_id(..)`.
    #[must_use]
    pub fn update<P: Serialize>(&self, patch: &P) -> UpdateQuery<T> {
        let patch: Result<Patch, ShimError> = to_object(patch).map_err(ShimError::encode);
        UpdateQuery::new(self.db.clone(), self.table.clone(), patch)
    }

    /// Updates the row when it has an id the server accepts, else inserts.
    #[must_use]
    pub fn upsert(&self, row: T) -> UpsertQuery<T> {
        UpsertQuery::new(self.db.clone(), self.table.clone(), vec![row])
    }

    #[must_use]
    pub fn upsert_many(&self, rows: Vec<T>) -> UpsertManyQuery<T> {
        UpsertManyQuery::new(self.db.clone(), self.table.clone(), rows)
    }

    /// Deletes the row picked by `.eq("id", ..)` or `.match_id(..)`.
    #[must_use]
    pub fn delete(&self) -> DeleteQuery<T> {
        DeleteQuery::new(self.db.clone(), self.table.clone())
    }
}
