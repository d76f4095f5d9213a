//! Chain builders returned by [`TableHandle`](crate::TableHandle).
//!
//! Every builder is a value: each chain method consumes it and returns the
//! next step, and cloning a builder forks the chain. A builder does nothing
//! until it is awaited (`IntoFuture`), and then issues its requests exactly
//! once. The awaited output is always an [`Envelope`](folio_core::Envelope);
//! failures never surface as panics or `Err`.

mod insert;
mod mutate;
mod select;
mod upsert;

use std::future::Future;
use std::pin::Pin;

use folio_core::Envelope;

pub use insert::{InsertManyQuery, InsertQuery};
pub use mutate::{DeleteQuery, UpdateQuery};
pub use select::{SelectQuery, SingleQuery};
pub use upsert::{UpsertManyQuery, UpsertQuery};

/// Future produced by awaiting a builder.
pub type ShimFuture<T> = Pin<Box<dyn Future<Output = Envelope<T>> + Send>>;

macro_rules! impl_call_options {
    ($($builder:ident),+ $(,)?) => {$(
        impl<T: folio_core::Record> $builder<T> {
            /// Overrides the request deadline for this operation.
            #[must_use]
            pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
                self.opts.timeout = timeout;
                self
            }

            /// Resolves to `ShimError::Cancelled` as soon as `token` fires.
            #[must_use]
            pub fn cancel_on(mut self, token: tokio_util::sync::CancellationToken) -> Self {
                self.opts.cancel = Some(token);
                self
            }
        }
    )+};
}

impl_call_options!(
    SelectQuery,
    SingleQuery,
    InsertQuery,
    InsertManyQuery,
    UpdateQuery,
    DeleteQuery,
    UpsertQuery,
    UpsertManyQuery,
);
