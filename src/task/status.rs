//! Status derivation.
//!
//! The overdue transition is a one-way decay: a `pending` or `in-progress`
//! task whose deadline has passed becomes `overdue`. `completed` and
//! `cancelled` are absorbing and pass through unchanged; a manual revert to
//! `pending` or `in-progress` makes the decay rule apply again on the next
//! derivation.
//!
//! The stored status is a cache of this derivation. The service re-runs it
//! immediately before persisting every create or update, so stored values can
//! lag real time only between writes. Statistics compute the overdue count
//! independently for that reason (see `task::stats`).

use chrono::{DateTime, Utc};

use super::record::TaskStatus;

/// Compute the status a record should carry at `now`.
pub fn derive_status(
    status: TaskStatus,
    expected_delivery_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TaskStatus {
    if status.is_terminal() {
        return status;
    }
    if now > expected_delivery_date {
        TaskStatus::Overdue
    } else {
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_past_deadline_decays_to_overdue() {
        let now = Utc::now();
        let deadline = now - Duration::hours(1);
        assert_eq!(
            derive_status(TaskStatus::Pending, deadline, now),
            TaskStatus::Overdue
        );
        assert_eq!(
            derive_status(TaskStatus::InProgress, deadline, now),
            TaskStatus::Overdue
        );
        // Already overdue stays overdue.
        assert_eq!(
            derive_status(TaskStatus::Overdue, deadline, now),
            TaskStatus::Overdue
        );
    }

    #[test]
    fn test_terminal_statuses_never_decay() {
        let now = Utc::now();
        let deadline = now - Duration::days(30);
        assert_eq!(
            derive_status(TaskStatus::Completed, deadline, now),
            TaskStatus::Completed
        );
        assert_eq!(
            derive_status(TaskStatus::Cancelled, deadline, now),
            TaskStatus::Cancelled
        );
    }

    #[test]
    fn test_future_deadline_keeps_status() {
        let now = Utc::now();
        let deadline = now + Duration::days(2);
        assert_eq!(
            derive_status(TaskStatus::Pending, deadline, now),
            TaskStatus::Pending
        );
        assert_eq!(
            derive_status(TaskStatus::InProgress, deadline, now),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn test_deadline_exactly_now_is_not_overdue() {
        let now = Utc::now();
        assert_eq!(
            derive_status(TaskStatus::Pending, now, now),
            TaskStatus::Pending
        );
    }
}
