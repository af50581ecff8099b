//! Storage abstraction for task records.
//!
//! The query builder produces a tagged [`Predicate`]; implementations decide
//! how to execute it. This keeps the task core decoupled from any one storage
//! technology. The process opens one store at startup and passes the handle
//! down explicitly; there is no ambient global connection.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::query::{Predicate, QueryPlan};
use crate::task::record::{OwnerId, Task, TaskId};

/// Persistence fault or timeout. Carries a description only; retry policy,
/// if any, belongs to the storage layer itself.
#[derive(Debug, Error)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Owner-scoped document store for task records.
///
/// Every operation is a single logical unit against the store. `find_one`,
/// `update_by_id` and `delete_by_id` are scoped by both id and owner, so a
/// missing record and a foreign record are indistinguishable.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<(), StorageError>;

    async fn find(&self, predicate: &Predicate, plan: &QueryPlan)
        -> Result<Vec<Task>, StorageError>;

    async fn find_one(&self, owner_id: OwnerId, id: TaskId)
        -> Result<Option<Task>, StorageError>;

    async fn count(&self, predicate: &Predicate) -> Result<u64, StorageError>;

    /// Persist the full current state of an already-stored task.
    /// Last write wins; no version check is performed.
    async fn update_by_id(&self, task: &Task) -> Result<(), StorageError>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete_by_id(&self, owner_id: OwnerId, id: TaskId) -> Result<bool, StorageError>;
}
