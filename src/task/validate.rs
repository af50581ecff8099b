//! Shared validation contract for task writes.
//!
//! Every rule is checked and every violation reported, so a caller fixing a
//! form gets the complete picture in one round trip.

use chrono::{DateTime, NaiveTime, Utc};

use super::error::FieldError;
use super::record::{TaskDraft, TaskPatch};

pub const MAX_ITEM_LEN: usize = 500;
pub const MAX_ASSIGNED_BY_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 1000;

/// Start of the calendar day containing `t` (UTC).
pub fn day_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Validate a create payload. `now` anchors the not-in-the-past deadline
/// rule, which compares at day granularity, not instant granularity.
pub fn validate_draft(draft: &TaskDraft, now: DateTime<Utc>) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    check_items(&draft.items, &mut errors);
    check_assigned_by(&draft.assigned_by, &mut errors);
    check_notes(&draft.notes, &mut errors);

    if draft.expected_delivery_date < day_start(now) {
        errors.push(FieldError::new(
            "expected_delivery_date",
            "Expected delivery date cannot be in the past",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate an update payload. All fields are optional; supplied fields must
/// satisfy the same rules as on create, except that the deadline may be any
/// timestamp (a stored deadline that has since passed is legal and drives the
/// overdue derivation).
pub fn validate_patch(patch: &TaskPatch) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if let Some(items) = &patch.items {
        check_items(items, &mut errors);
    }
    if let Some(assigned_by) = &patch.assigned_by {
        check_assigned_by(assigned_by, &mut errors);
    }
    if let Some(notes) = &patch.notes {
        check_notes(notes, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_items(items: &[String], errors: &mut Vec<FieldError>) {
    if items.is_empty() {
        errors.push(FieldError::new("items", "At least one task is required"));
        return;
    }
    for (i, item) in items.iter().enumerate() {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            errors.push(FieldError::new(
                format!("items[{}]", i),
                "Task description cannot be empty",
            ));
        } else if trimmed.chars().count() > MAX_ITEM_LEN {
            errors.push(FieldError::new(
                format!("items[{}]", i),
                format!("Task description cannot exceed {} characters", MAX_ITEM_LEN),
            ));
        }
    }
}

fn check_assigned_by(assigned_by: &str, errors: &mut Vec<FieldError>) {
    let trimmed = assigned_by.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(
            "assigned_by",
            "Assigned by field is required",
        ));
    } else if trimmed.chars().count() > MAX_ASSIGNED_BY_LEN {
        errors.push(FieldError::new(
            "assigned_by",
            format!("Assigned by cannot exceed {} characters", MAX_ASSIGNED_BY_LEN),
        ));
    }
}

fn check_notes(notes: &str, errors: &mut Vec<FieldError>) {
    if notes.trim().chars().count() > MAX_NOTES_LEN {
        errors.push(FieldError::new(
            "notes",
            format!("Notes cannot exceed {} characters", MAX_NOTES_LEN),
        ));
    }
}
