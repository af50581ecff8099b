//! Aggregate statistics over an owner's task collection.
//!
//! Two overdue measurements exist on purpose. The per-status bucket counts
//! whatever status snapshots are stored, which can lag real time for records
//! not rewritten since their deadline passed. The `overdue` field is computed
//! independently from deadlines and is the authoritative number for
//! reporting; the two can disagree only inside that staleness window.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::query::{Clause, Predicate};
use super::record::{OwnerId, TaskStatus};

/// Per-owner task statistics. Buckets with no matching records report 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: u64,
    /// Deadline-based count, independent of stored status snapshots.
    pub overdue: u64,
    pub pending: u64,
    #[serde(rename = "in-progress")]
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

/// Predicate matching every record owned by `owner_id`.
pub fn total_predicate(owner_id: OwnerId) -> Predicate {
    Predicate::for_owner(owner_id)
}

/// Predicate matching records whose stored status equals `status`.
pub fn status_bucket_predicate(owner_id: OwnerId, status: TaskStatus) -> Predicate {
    Predicate::for_owner(owner_id).with(Clause::StatusIs(status))
}

/// Predicate for the independent overdue count: non-terminal stored status
/// with a deadline already behind `now`.
pub fn overdue_predicate(owner_id: OwnerId, now: DateTime<Utc>) -> Predicate {
    Predicate::for_owner(owner_id)
        .with(Clause::StatusIn(vec![
            TaskStatus::Pending,
            TaskStatus::InProgress,
        ]))
        .with(Clause::DeadlineBefore(now))
}
