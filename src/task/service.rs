//! Task service.
//!
//! Orchestrates create/read/update/delete over the storage handle, applying
//! validation before any write, the status derivation on every write path,
//! and the query builder on every read path. Operations are request-scoped
//! and stateless between requests; update is a read-modify-write with
//! last-write-wins semantics and no version field.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::TaskError;
use super::query::{self, Pagination, QueryPlan, TaskFilters};
use super::record::{OwnerId, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
use super::stats::{self, TaskStats};
use super::status::derive_status;
use super::validate;
use crate::store::TaskStore;

/// A page of tasks plus its pagination metadata.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

/// Owner-scoped task operations over a storage handle.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new task. `created_at` is set to `now`; the
    /// stored status is the derivation result, never the raw draft value.
    pub async fn create(
        &self,
        owner_id: OwnerId,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        validate::validate_draft(&draft, now).map_err(TaskError::Validation)?;

        let task = Task {
            id: TaskId::new(),
            owner_id,
            created_at: now,
            items: trim_all(draft.items),
            expected_delivery_date: draft.expected_delivery_date,
            delivered_on: draft.delivered_on,
            assigned_by: draft.assigned_by.trim().to_string(),
            status: derive_status(draft.status, draft.expected_delivery_date, now),
            priority: draft.priority,
            notes: draft.notes.trim().to_string(),
        };

        self.store.insert(&task).await?;
        debug!(task_id = %task.id, owner_id = %owner_id, "task created");
        Ok(task)
    }

    /// Return one page of the owner's tasks for the given filters.
    pub async fn list(
        &self,
        owner_id: OwnerId,
        filters: &TaskFilters,
        now: DateTime<Utc>,
    ) -> Result<TaskPage, TaskError> {
        let (predicate, plan) = query::build_query(owner_id, filters, now);
        let tasks = self.store.find(&predicate, &plan).await?;
        let total = self.store.count(&predicate).await?;

        let page = filters.page.unwrap_or(1).max(1);
        let limit = filters.limit.unwrap_or(query::DEFAULT_PAGE_LIMIT).max(1);
        Ok(TaskPage {
            tasks,
            pagination: Pagination::compute(total, page, limit),
        })
    }

    /// Return every matching task in sort order, without pagination.
    /// Serves the export path, which must never be silently capped.
    pub async fn list_all(
        &self,
        owner_id: OwnerId,
        filters: &TaskFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, TaskError> {
        let predicate = query::build_predicate(owner_id, filters, now);
        Ok(self.store.find(&predicate, &QueryPlan::unbounded()).await?)
    }

    /// Fetch a single task. Non-existence and foreign ownership are the
    /// same `NotFound` to the caller.
    pub async fn get(&self, owner_id: OwnerId, id: TaskId) -> Result<Task, TaskError> {
        self.store
            .find_one(owner_id, id)
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Apply a partial update: scoped fetch, validate, apply the
    /// completed/delivered_on coupling, re-derive status, persist.
    pub async fn update(
        &self,
        owner_id: OwnerId,
        id: TaskId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let mut task = self
            .store
            .find_one(owner_id, id)
            .await?
            .ok_or(TaskError::NotFound)?;

        validate::validate_patch(&patch).map_err(TaskError::Validation)?;

        if let Some(items) = patch.items {
            task.items = trim_all(items);
        }
        if let Some(deadline) = patch.expected_delivery_date {
            task.expected_delivery_date = deadline;
        }
        if let Some(assigned_by) = patch.assigned_by {
            task.assigned_by = assigned_by.trim().to_string();
        }
        if let Some(notes) = patch.notes {
            task.notes = notes.trim().to_string();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        // An explicit delivered_on (value or null) is applied before the
        // status coupling so that a supplied value takes precedence.
        if let Some(delivered_on) = patch.delivered_on {
            task.delivered_on = delivered_on;
        }
        if let Some(new_status) = patch.status {
            let previous = task.status;
            task.status = new_status;
            if new_status == TaskStatus::Completed && task.delivered_on.is_none() {
                task.delivered_on = Some(now);
            }
            if previous == TaskStatus::Completed && new_status != TaskStatus::Completed {
                // A stale delivery timestamp must not survive a reversal.
                task.delivered_on = None;
            }
        }

        task.status = derive_status(task.status, task.expected_delivery_date, now);

        self.store.update_by_id(&task).await?;
        debug!(task_id = %task.id, owner_id = %owner_id, status = %task.status, "task updated");
        Ok(task)
    }

    /// Scoped hard delete; no tombstone is kept.
    pub async fn delete(&self, owner_id: OwnerId, id: TaskId) -> Result<(), TaskError> {
        // Fetch first so a foreign id reports the same NotFound as a
        // missing one.
        self.store
            .find_one(owner_id, id)
            .await?
            .ok_or(TaskError::NotFound)?;
        self.store.delete_by_id(owner_id, id).await?;
        debug!(task_id = %id, owner_id = %owner_id, "task deleted");
        Ok(())
    }

    /// Compute per-status counts plus the independent overdue count.
    pub async fn stats(
        &self,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<TaskStats, TaskError> {
        let total = self.store.count(&stats::total_predicate(owner_id)).await?;
        let overdue = self
            .store
            .count(&stats::overdue_predicate(owner_id, now))
            .await?;

        let bucket = |status| stats::status_bucket_predicate(owner_id, status);
        let pending = self.store.count(&bucket(TaskStatus::Pending)).await?;
        let in_progress = self.store.count(&bucket(TaskStatus::InProgress)).await?;
        let completed = self.store.count(&bucket(TaskStatus::Completed)).await?;
        let cancelled = self.store.count(&bucket(TaskStatus::Cancelled)).await?;

        Ok(TaskStats {
            total,
            overdue,
            pending,
            in_progress,
            completed,
            cancelled,
        })
    }
}

fn trim_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::task::record::TaskPriority;
    use chrono::Duration;
    use uuid::Uuid;

    fn service() -> (TaskService, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        (TaskService::new(store.clone()), store)
    }

    fn owner() -> OwnerId {
        OwnerId(Uuid::new_v4())
    }

    fn draft(now: DateTime<Utc>) -> TaskDraft {
        TaskDraft {
            items: vec!["  Ship the report  ".to_string()],
            expected_delivery_date: now + Duration::days(7),
            delivered_on: None,
            assigned_by: "Alice Smith".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_trims_and_persists() {
        let (svc, _) = service();
        let now = Utc::now();
        let task = svc.create(owner(), draft(now), now).await.unwrap();
        assert_eq!(task.items, vec!["Ship the report"]);
        assert_eq!(task.created_at, now);
        assert_eq!(task.status, TaskStatus::Pending);

        let fetched = svc.get(task.owner_id, task.id).await.unwrap();
        assert_eq!(fetched.items, task.items);
    }

    #[tokio::test]
    async fn test_create_rejects_yesterday_deadline() {
        let (svc, _) = service();
        let now = Utc::now();
        let mut d = draft(now);
        d.expected_delivery_date = now - Duration::days(1);
        let err = svc.create(owner(), d, now).await.unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cross_owner_access_is_not_found() {
        let (svc, _) = service();
        let now = Utc::now();
        let task = svc.create(owner(), draft(now), now).await.unwrap();

        let stranger = owner();
        assert!(matches!(
            svc.get(stranger, task.id).await.unwrap_err(),
            TaskError::NotFound
        ));
        assert!(matches!(
            svc.update(stranger, task.id, TaskPatch::default(), now)
                .await
                .unwrap_err(),
            TaskError::NotFound
        ));
        assert!(matches!(
            svc.delete(stranger, task.id).await.unwrap_err(),
            TaskError::NotFound
        ));
        // Still present for its real owner.
        assert!(svc.get(task.owner_id, task.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_completing_stamps_delivered_on() {
        let (svc, _) = service();
        let now = Utc::now();
        let o = owner();
        let task = svc.create(o, draft(now), now).await.unwrap();

        let later = now + Duration::hours(2);
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let updated = svc.update(o, task.id, patch, later).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.delivered_on, Some(later));
    }

    #[tokio::test]
    async fn test_explicit_delivered_on_takes_precedence() {
        let (svc, _) = service();
        let now = Utc::now();
        let o = owner();
        let task = svc.create(o, draft(now), now).await.unwrap();

        let explicit = now + Duration::hours(1);
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            delivered_on: Some(Some(explicit)),
            ..Default::default()
        };
        let updated = svc
            .update(o, task.id, patch, now + Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(updated.delivered_on, Some(explicit));
    }

    #[tokio::test]
    async fn test_reverting_from_completed_clears_delivered_on() {
        let (svc, _) = service();
        let now = Utc::now();
        let o = owner();
        let task = svc.create(o, draft(now), now).await.unwrap();

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        svc.update(o, task.id, patch, now).await.unwrap();

        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };
        let reverted = svc.update(o, task.id, patch, now).await.unwrap();
        assert_eq!(reverted.status, TaskStatus::InProgress);
        assert_eq!(reverted.delivered_on, None);
    }

    #[tokio::test]
    async fn test_update_rederives_overdue() {
        let (svc, _) = service();
        let now = Utc::now();
        let o = owner();
        let task = svc.create(o, draft(now), now).await.unwrap();

        // The deadline passes, then any write re-runs the derivation.
        let after_deadline = now + Duration::days(8);
        let patch = TaskPatch {
            notes: Some("still waiting".to_string()),
            ..Default::default()
        };
        let updated = svc.update(o, task.id, patch, after_deadline).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Overdue);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let (svc, _) = service();
        let o = owner();
        let base = Utc::now();
        for i in 0..25 {
            let now = base - Duration::minutes(i);
            svc.create(o, draft(now), now).await.unwrap();
        }

        let filters = TaskFilters {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        let page = svc.list(o, &filters, base).await.unwrap();
        assert_eq!(page.tasks.len(), 5);
        assert_eq!(page.pagination.current_page, 3);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.total_tasks, 25);
        assert!(!page.pagination.has_next_page);
        assert!(page.pagination.has_prev_page);
    }

    #[tokio::test]
    async fn test_list_all_is_unbounded() {
        let (svc, _) = service();
        let o = owner();
        let base = Utc::now();
        for i in 0..25 {
            let now = base - Duration::minutes(i);
            svc.create(o, draft(now), now).await.unwrap();
        }
        let all = svc.list_all(o, &TaskFilters::default(), base).await.unwrap();
        assert_eq!(all.len(), 25);
    }

    #[tokio::test]
    async fn test_stats_counts_stale_overdue_independently() {
        let (svc, store) = service();
        let o = owner();
        let now = Utc::now();

        // Three records whose deadline passed but whose stored status was
        // never re-derived: written directly, bypassing the service.
        for _ in 0..3 {
            let stale = Task {
                id: TaskId::new(),
                owner_id: o,
                created_at: now - Duration::days(10),
                items: vec!["Late item".to_string()],
                expected_delivery_date: now - Duration::days(2),
                delivered_on: None,
                assigned_by: "Carol".to_string(),
                status: TaskStatus::Pending,
                priority: TaskPriority::Low,
                notes: String::new(),
            };
            store.insert(&stale).await.unwrap();
        }
        // Seven completed records through the normal path.
        for _ in 0..7 {
            let task = svc.create(o, draft(now), now).await.unwrap();
            let patch = TaskPatch {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            };
            svc.update(o, task.id, patch, now).await.unwrap();
        }

        let stats = svc.stats(o, now).await.unwrap();
        assert_eq!(stats.total, 10);
        // Both counts are independently correct, not mutually exclusive:
        // the stale records are pending by stored status AND overdue by
        // deadline at the same time.
        assert_eq!(stats.overdue, 3);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.completed, 7);
        assert_eq!(stats.cancelled, 0);
        assert_eq!(stats.in_progress, 0);
    }
}
