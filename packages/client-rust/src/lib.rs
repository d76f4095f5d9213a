//! Folio Client: chainable REST query builder, optimistic update controller,
//! object storage, and the portfolio chat assistant.

pub mod assistant;
pub mod builder;
pub mod config;
pub mod db;
pub mod exec;
pub mod optimistic;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use assistant::{ChatAssistant, CompletionClient, HttpCompletionClient};
pub use builder::{
    DeleteQuery, InsertManyQuery, InsertQuery, SelectQuery, SingleQuery, UpdateQuery,
    UpsertManyQuery, UpsertQuery,
};
pub use config::ClientConfig;
pub use db::{Db, TableHandle};
pub use optimistic::{
    ChannelNotifier, CommitOutcome, CompositeNotifier, ControllerError, Editor, Notification,
    Notifier, OptimisticStore, Phase, TracingNotifier,
};
pub use storage::{HttpObjectStorage, MemoryObjectStorage, ObjectStorage};
pub use transport::{HttpTransport, Transport};
