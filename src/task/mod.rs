//! Task module - the task lifecycle and query engine.
//!
//! Pure functions (status derivation, validation, query building) are
//! separated from IO; the service orchestrates them against the storage
//! handle.

pub mod error;
pub mod query;
pub mod record;
pub mod service;
pub mod stats;
pub mod status;
pub mod validate;

pub use error::{FieldError, TaskError};
pub use query::{DateFilter, Pagination, TaskFilters};
pub use record::{OwnerId, Task, TaskDraft, TaskId, TaskPatch, TaskPriority, TaskStatus};
pub use service::{TaskPage, TaskService};
pub use stats::TaskStats;
pub use status::derive_status;
