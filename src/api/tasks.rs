//! Task CRUD and statistics endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use crate::task::{OwnerId, TaskDraft, TaskFilters, TaskId, TaskPatch};

/// Query parameters for task listings and exports. Field names match the
/// frontend's query string. Every field is raw text so extraction itself
/// never rejects; unrecognized or malformed values are dropped during
/// conversion rather than failing the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilterQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub date_filter: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
}

impl TaskFilterQuery {
    /// Convert raw query parameters into typed filters. `"all"` and
    /// unrecognized status/priority/dateFilter values mean "no filter";
    /// unparseable pages, limits and custom dates drop the constraint,
    /// matching the builder's treatment of an incomplete range.
    pub fn into_filters(self) -> TaskFilters {
        TaskFilters {
            status: self
                .status
                .filter(|s| s != "all")
                .and_then(|s| s.parse().ok()),
            priority: self
                .priority
                .filter(|p| p != "all")
                .and_then(|p| p.parse().ok()),
            date_filter: self.date_filter.and_then(|d| d.parse().ok()),
            start_date: self.start_date.as_deref().and_then(parse_date_param),
            end_date: self.end_date.as_deref().and_then(parse_date_param),
            search: self.search,
            page: self.page.and_then(|p| p.parse().ok()),
            limit: self.limit.and_then(|l| l.parse().ok()),
        }
    }
}

/// Parse the `:id` path segment. A malformed id is reported the same way
/// as a missing record, in the standard envelope.
fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse::<Uuid>()
        .map(TaskId)
        .map_err(|_| ApiError::NotFound("Task not found".to_string()))
}

/// Accept either a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date
/// (interpreted as midnight UTC).
fn parse_date_param(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let task = state
        .tasks
        .create(OwnerId(auth.id), draft, Utc::now())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Task created successfully",
            "task": task,
        })),
    ))
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<TaskFilterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filters = query.into_filters();
    let page = state
        .tasks
        .list(OwnerId(auth.id), &filters, Utc::now())
        .await?;
    Ok(Json(json!({
        "success": true,
        "tasks": page.tasks,
        "pagination": page.pagination,
    })))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = state.tasks.get(OwnerId(auth.id), id).await?;
    Ok(Json(json!({ "success": true, "task": task })))
}

/// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = state
        .tasks
        .update(OwnerId(auth.id), id, patch, Utc::now())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Task updated successfully",
        "task": task,
    })))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_task_id(&id)?;
    state.tasks.delete(OwnerId(auth.id), id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Task deleted successfully",
    })))
}

/// GET /api/tasks/stats
pub async fn get_task_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.tasks.stats(OwnerId(auth.id), Utc::now()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
