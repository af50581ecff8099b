//! Query builder.
//!
//! Translates filter parameters into a storage-agnostic predicate plus a
//! sort/skip/limit plan. The predicate is a tagged structure rather than a
//! query string, so the storage backend decides how to execute it.
//!
//! The owner scope is merged first and cannot be overridden by any filter.
//! All active filter dimensions combine conjunctively; free-text search
//! contributes a disjunctive sub-clause over its three target fields.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::record::{OwnerId, TaskPriority, TaskStatus};
use super::validate::day_start;

/// Default page size when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Named date windows over the task creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    /// The current calendar day.
    Today,
    /// From the start of the current week (Sunday) onward.
    Week,
    /// From the first of the current month onward.
    Month,
    /// An explicit inclusive range; requires both bounds.
    Custom,
}

impl std::str::FromStr for DateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown date filter: {}", other)),
        }
    }
}

/// Filter parameters for a task listing.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub date_filter: Option<DateFilter>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
    /// 1-based page number. Values below 1 are clamped to 1.
    pub page: Option<u64>,
    /// Page size. Never silently capped; export callers pass very large
    /// values or bypass pagination entirely.
    pub limit: Option<u64>,
}

/// Upper bound of a date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Inclusive(DateTime<Utc>),
    Exclusive(DateTime<Utc>),
}

/// One conjunct of a task predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    StatusIs(TaskStatus),
    StatusIn(Vec<TaskStatus>),
    PriorityIs(TaskPriority),
    /// Window over `created_at`. Either side may be open.
    CreatedWithin {
        from: Option<DateTime<Utc>>,
        to: Option<Bound>,
    },
    /// `expected_delivery_date` strictly before the instant.
    DeadlineBefore(DateTime<Utc>),
    /// Case-insensitive substring over items, assigned_by and notes
    /// (disjunctive across the three fields).
    Search(String),
}

/// Composed filter condition handed to the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Always present; merged before any caller-supplied filter.
    pub owner_id: OwnerId,
    pub clauses: Vec<Clause>,
}

impl Predicate {
    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            clauses: Vec::new(),
        }
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }
}

/// Sort order for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    CreatedDesc,
}

/// Sort/skip/limit plan accompanying a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub sort: SortOrder,
    pub skip: u64,
    /// `None` means unbounded (export path).
    pub limit: Option<u64>,
}

impl QueryPlan {
    /// Plan returning every matching record in sort order.
    pub fn unbounded() -> Self {
        Self {
            sort: SortOrder::CreatedDesc,
            skip: 0,
            limit: None,
        }
    }
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_tasks: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn compute(total_tasks: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total_tasks.div_ceil(limit);
        Self {
            current_page: page,
            total_pages,
            total_tasks,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Build the predicate and plan for a filtered, paginated task listing.
pub fn build_query(
    owner_id: OwnerId,
    filters: &TaskFilters,
    now: DateTime<Utc>,
) -> (Predicate, QueryPlan) {
    let predicate = build_predicate(owner_id, filters, now);

    let page = filters.page.unwrap_or(1).max(1);
    let limit = filters.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
    let plan = QueryPlan {
        sort: SortOrder::CreatedDesc,
        skip: (page - 1) * limit,
        limit: Some(limit),
    };

    (predicate, plan)
}

/// Build only the predicate; used by the export path, which takes every
/// matching record without pagination.
pub fn build_predicate(
    owner_id: OwnerId,
    filters: &TaskFilters,
    now: DateTime<Utc>,
) -> Predicate {
    let mut predicate = Predicate::for_owner(owner_id);

    if let Some(status) = filters.status {
        predicate.clauses.push(Clause::StatusIs(status));
    }
    if let Some(priority) = filters.priority {
        predicate.clauses.push(Clause::PriorityIs(priority));
    }
    if let Some(window) = date_window(filters, now) {
        predicate.clauses.push(window);
    }
    if let Some(search) = filters.search.as_deref() {
        let term = search.trim();
        if !term.is_empty() {
            predicate.clauses.push(Clause::Search(term.to_string()));
        }
    }

    predicate
}

/// Resolve the date filter to a window over `created_at`.
///
/// A custom filter with either bound missing contributes no constraint at
/// all; this mirrors the behavior of treating an incomplete range as "no
/// range" rather than an error.
fn date_window(filters: &TaskFilters, now: DateTime<Utc>) -> Option<Clause> {
    match filters.date_filter? {
        DateFilter::Today => {
            let start = day_start(now);
            Some(Clause::CreatedWithin {
                from: Some(start),
                to: Some(Bound::Exclusive(start + Duration::days(1))),
            })
        }
        DateFilter::Week => Some(Clause::CreatedWithin {
            from: Some(week_start(now)),
            to: None,
        }),
        DateFilter::Month => Some(Clause::CreatedWithin {
            from: Some(month_start(now)),
            to: None,
        }),
        DateFilter::Custom => match (filters.start_date, filters.end_date) {
            (Some(start), Some(end)) => Some(Clause::CreatedWithin {
                from: Some(start),
                to: Some(Bound::Inclusive(end)),
            }),
            _ => None,
        },
    }
}

/// Midnight at the start of the current week. Weeks start on Sunday.
fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_into_week = now.weekday().num_days_from_sunday() as i64;
    day_start(now) - Duration::days(days_into_week)
}

/// Midnight on the first day of the current month.
fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    first.and_time(chrono::NaiveTime::MIN).and_utc()
}
