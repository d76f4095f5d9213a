//! Immutable query descriptor built up by a chain of builder calls.
//!
//! Each `with_*` method consumes the descriptor and returns a new one, so a
//! chain can be cloned at any point and the two branches never observe each
//! other's changes. A finished descriptor is folded into the query-string
//! pairs of exactly one request.

use crate::error::ShimError;

/// Projection used when `select` is called without columns.
pub const DEFAULT_COLUMNS: &str = "*";

/// Primary-key column. Mutations can only target rows through it.
pub const ID_COLUMN: &str = "id";

/// Query-string names the endpoint reads as controls rather than filters.
pub const RESERVED_PARAMS: [&str; 4] = ["limit", "order_by", "order_dir", "select"];

/// Sort direction for an [`Order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Wire value for the `order_dir` query parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Maps the builder's `ascending` flag to a direction.
    #[must_use]
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Single sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Equality constraint `column = value`.
///
/// Values are carried in their query-string form; typed comparison is the
/// server's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    /// Resolves this filter to a primary-key value for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::UnsupportedFilter`] when the filter targets any
    /// column other than `id`.
    pub fn as_id(&self, operation: &'static str) -> Result<&str, ShimError> {
        if self.column == ID_COLUMN {
            Ok(&self.value)
        } else {
            Err(ShimError::UnsupportedFilter {
                operation,
                column: self.column.clone(),
            })
        }
    }
}

/// Resolves an optional filter to the id targeted by a mutation.
///
/// # Errors
///
/// [`ShimError::MissingFilter`] when no filter was set, and
/// [`ShimError::UnsupportedFilter`] when it names a non-id column.
pub fn mutation_target<'a>(
    filter: Option<&'a Filter>,
    operation: &'static str,
) -> Result<&'a str, ShimError> {
    filter
        .ok_or(ShimError::MissingFilter { operation })?
        .as_id(operation)
}

/// Accumulated read state for one logical query.
///
/// Supports a single equality filter and a single sort key: a second call
/// to [`with_filter`](Self::with_filter) or [`with_order`](Self::with_order)
/// replaces the first. A filter cannot name one of [`RESERVED_PARAMS`];
/// [`query_pairs`](Self::query_pairs) refuses such a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    table: String,
    columns: String,
    filter: Option<Filter>,
    order: Option<Order>,
    limit: Option<u64>,
    single: bool,
}

impl QueryDescriptor {
    /// Starts a descriptor for `table` selecting every column.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: DEFAULT_COLUMNS.to_string(),
            filter: None,
            order: None,
            limit: None,
            single: false,
        }
    }

    #[must_use]
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Sets the equality filter, replacing any previous one.
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter = Some(Filter {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    /// Sets the sort key, replacing any previous one.
    #[must_use]
    pub fn with_order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction: Direction::from_ascending(ascending),
        });
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Marks the query as expecting at most one row.
    #[must_use]
    pub fn into_single(mut self) -> Self {
        self.single = true;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &str {
        &self.columns
    }

    #[must_use]
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Row cap actually sent: `single` forces 1 regardless of `limit`.
    #[must_use]
    pub fn effective_limit(&self) -> Option<u64> {
        if self.single {
            Some(1)
        } else {
            self.limit
        }
    }

    /// Folds the descriptor into query-string pairs.
    ///
    /// Order of pairs: `limit`, `order_by`, `order_dir`, `select` (only when
    /// not `*`), then the bare `column=value` filter. Percent-encoding is
    /// left to the URL builder.
    ///
    /// # Errors
    ///
    /// [`ShimError::ReservedColumn`] when the filter column would be read
    /// back as a control parameter.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, ShimError> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(limit) = self.effective_limit() {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(order) = &self.order {
            pairs.push(("order_by".to_string(), order.column.clone()));
            pairs.push(("order_dir".to_string(), order.direction.as_str().to_string()));
        }
        if self.columns != DEFAULT_COLUMNS {
            pairs.push(("select".to_string(), self.columns.clone()));
        }
        if let Some(filter) = &self.filter {
            if RESERVED_PARAMS.contains(&filter.column.as_str()) {
                return Err(ShimError::ReservedColumn {
                    column: filter.column.clone(),
                });
            }
            pairs.push((filter.column.clone(), filter.value.clone()));
        }
        Ok(pairs)
    }
}
