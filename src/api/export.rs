//! Tabular export endpoint.
//!
//! Serves the full filtered result set (no pagination) shaped as
//! spreadsheet rows; the client renders the actual workbook. The same
//! filters as the listing endpoint apply.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::tasks::TaskFilterQuery;
use crate::task::{OwnerId, Task};

/// One spreadsheet row. Field names are the column headers.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    #[serde(rename = "S.No")]
    pub serial: usize,
    #[serde(rename = "Task Created Date")]
    pub created: String,
    #[serde(rename = "Tasks")]
    pub items: String,
    #[serde(rename = "Expected Delivery Date")]
    pub expected_delivery: String,
    #[serde(rename = "Delivered On")]
    pub delivered_on: String,
    #[serde(rename = "Assigned By")]
    pub assigned_by: String,
    #[serde(rename = "Current Status")]
    pub status: String,
    #[serde(rename = "Priority")]
    pub priority: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Created By")]
    pub created_by: String,
}

impl ExportRow {
    fn from_task(serial: usize, task: &Task, owner_name: &str) -> Self {
        Self {
            serial,
            created: format_date(task.created_at),
            items: task.items.join("; "),
            expected_delivery: format_date(task.expected_delivery_date),
            delivered_on: task
                .delivered_on
                .map(format_date)
                .unwrap_or_else(|| "Not Delivered".to_string()),
            assigned_by: task.assigned_by.clone(),
            status: capitalize(task.status.as_str()),
            priority: capitalize(task.priority.as_str()),
            notes: if task.notes.is_empty() {
                "No notes".to_string()
            } else {
                task.notes.clone()
            },
            created_by: owner_name.to_string(),
        }
    }
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d").to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// GET /api/export/xlsx
pub async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<TaskFilterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filters_echo = json!({
        "status": query.status.clone(),
        "priority": query.priority.clone(),
        "dateFilter": query.date_filter.clone(),
        "startDate": query.start_date.clone(),
        "endDate": query.end_date.clone(),
        "search": query.search.clone(),
    });

    let filters = query.into_filters();
    let tasks = state
        .tasks
        .list_all(OwnerId(auth.id), &filters, Utc::now())
        .await?;

    let rows: Vec<ExportRow> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| ExportRow::from_task(i + 1, task, &auth.name))
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": rows,
        "totalRecords": rows.len(),
        "exportDate": Utc::now().to_rfc3339(),
        "filters": filters_echo,
    })))
}
