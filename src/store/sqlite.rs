//! SQLite-backed storage for tasks and user accounts.
//!
//! Timestamps are stored as RFC 3339 text in UTC, so lexicographic
//! comparison in SQL matches chronological order. The `items` list is stored
//! as a JSON array in a single text column; the free-text search clause
//! unpacks it with `json_each` and runs `LIKE` per entry. LIKE folds case
//! for ASCII only, so the search is case-sensitive for non-ASCII terms.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StorageError, TaskStore};
use crate::task::query::{Bound, Clause, Predicate, QueryPlan, SortOrder};
use crate::task::record::{OwnerId, Task, TaskId, TaskPriority, TaskStatus};
use crate::users::User;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id                      TEXT PRIMARY KEY,
    owner_id                TEXT NOT NULL,
    created_at              TEXT NOT NULL,
    items                   TEXT NOT NULL,
    expected_delivery_date  TEXT NOT NULL,
    delivered_on            TEXT,
    assigned_by             TEXT NOT NULL,
    status                  TEXT NOT NULL DEFAULT 'pending',
    priority                TEXT NOT NULL DEFAULT 'medium',
    notes                   TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner_created ON tasks(owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_deadline ON tasks(expected_delivery_date);

CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    created_at     TEXT NOT NULL
);
";

const TASK_COLUMNS: &str = "id, owner_id, created_at, items, expected_delivery_date, \
     delivered_on, assigned_by, status, priority, notes";

/// SQLite store holding both task records and user accounts.
///
/// Opened once at process start and passed down as a handle; closed when the
/// process exits and the handle is dropped.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn bootstrap(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // User accounts
    // ─────────────────────────────────────────────────────────────────────

    pub async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, email, password_hash, created_at
                 FROM users WHERE email = ?1",
            )
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![email], row_to_user)
            .map_err(db_err)?;
        rows.next().transpose().map_err(db_err)
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, email, password_hash, created_at
                 FROM users WHERE id = ?1",
            )
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![id.to_string()], row_to_user)
            .map_err(db_err)?;
        rows.next().transpose().map_err(db_err)
    }

    pub async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert(&self, task: &Task) -> Result<(), StorageError> {
        let items = serde_json::to_string(&task.items)
            .map_err(|e| StorageError::new(format!("failed to encode items: {}", e)))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO tasks (id, owner_id, created_at, items, expected_delivery_date,
                                delivered_on, assigned_by, status, priority, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id.to_string(),
                task.owner_id.to_string(),
                task.created_at.to_rfc3339(),
                items,
                task.expected_delivery_date.to_rfc3339(),
                task.delivered_on.map(|d| d.to_rfc3339()),
                task.assigned_by,
                task.status.as_str(),
                task.priority.as_str(),
                task.notes,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn find(
        &self,
        predicate: &Predicate,
        plan: &QueryPlan,
    ) -> Result<Vec<Task>, StorageError> {
        let (where_sql, mut values) = predicate_where(predicate);
        let mut sql = format!("SELECT {} FROM tasks WHERE {}", TASK_COLUMNS, where_sql);
        match plan.sort {
            SortOrder::CreatedDesc => sql.push_str(" ORDER BY created_at DESC, rowid DESC"),
        }
        match plan.limit {
            Some(limit) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                values.push(Value::from(limit as i64));
                values.push(Value::from(plan.skip as i64));
            }
            None if plan.skip > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                values.push(Value::from(plan.skip as i64));
            }
            None => {}
        }

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_task)
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    async fn find_one(
        &self,
        owner_id: OwnerId,
        id: TaskId,
    ) -> Result<Option<Task>, StorageError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = ?1 AND owner_id = ?2",
            TASK_COLUMNS
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![id.to_string(), owner_id.to_string()], row_to_task)
            .map_err(db_err)?;
        rows.next().transpose().map_err(db_err)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, StorageError> {
        let (where_sql, values) = predicate_where(predicate);
        let sql = format!("SELECT COUNT(*) FROM tasks WHERE {}", where_sql);
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }

    async fn update_by_id(&self, task: &Task) -> Result<(), StorageError> {
        let items = serde_json::to_string(&task.items)
            .map_err(|e| StorageError::new(format!("failed to encode items: {}", e)))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE tasks
             SET items = ?1, expected_delivery_date = ?2, delivered_on = ?3,
                 assigned_by = ?4, status = ?5, priority = ?6, notes = ?7
             WHERE id = ?8 AND owner_id = ?9",
            params![
                items,
                task.expected_delivery_date.to_rfc3339(),
                task.delivered_on.map(|d| d.to_rfc3339()),
                task.assigned_by,
                task.status.as_str(),
                task.priority.as_str(),
                task.notes,
                task.id.to_string(),
                task.owner_id.to_string(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_by_id(&self, owner_id: OwnerId, id: TaskId) -> Result<bool, StorageError> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner_id.to_string()],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

/// Render a predicate as a WHERE fragment plus bound parameter values.
/// The owner scope comes first and is always present.
fn predicate_where(predicate: &Predicate) -> (String, Vec<Value>) {
    let mut sql = String::from("owner_id = ?");
    let mut values = vec![Value::from(predicate.owner_id.to_string())];

    for clause in &predicate.clauses {
        match clause {
            Clause::StatusIs(status) => {
                sql.push_str(" AND status = ?");
                values.push(Value::from(status.as_str().to_string()));
            }
            Clause::StatusIn(statuses) => {
                let marks = vec!["?"; statuses.len()].join(", ");
                sql.push_str(&format!(" AND status IN ({})", marks));
                for status in statuses {
                    values.push(Value::from(status.as_str().to_string()));
                }
            }
            Clause::PriorityIs(priority) => {
                sql.push_str(" AND priority = ?");
                values.push(Value::from(priority.as_str().to_string()));
            }
            Clause::CreatedWithin { from, to } => {
                if let Some(from) = from {
                    sql.push_str(" AND created_at >= ?");
                    values.push(Value::from(from.to_rfc3339()));
                }
                match to {
                    Some(Bound::Inclusive(t)) => {
                        sql.push_str(" AND created_at <= ?");
                        values.push(Value::from(t.to_rfc3339()));
                    }
                    Some(Bound::Exclusive(t)) => {
                        sql.push_str(" AND created_at < ?");
                        values.push(Value::from(t.to_rfc3339()));
                    }
                    None => {}
                }
            }
            Clause::DeadlineBefore(t) => {
                sql.push_str(" AND expected_delivery_date < ?");
                values.push(Value::from(t.to_rfc3339()));
            }
            Clause::Search(term) => {
                // Items are matched per entry through json_each, never
                // against the raw JSON text: a term spanning two entries
                // must not hit, and quotes inside an entry must (the
                // encoded text holds them escaped). SQLite LIKE folds
                // case for ASCII only; non-ASCII terms match
                // case-sensitively.
                sql.push_str(
                    " AND (EXISTS (SELECT 1 FROM json_each(tasks.items) \
                       WHERE json_each.value LIKE ? ESCAPE '\\') \
                       OR assigned_by LIKE ? ESCAPE '\\' \
                       OR notes LIKE ? ESCAPE '\\')",
                );
                let pattern = like_pattern(term);
                for _ in 0..3 {
                    values.push(Value::from(pattern.clone()));
                }
            }
        }
    }

    (sql, values)
}

/// Substring LIKE pattern with metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::new(e.to_string())
}

fn conv_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn invalid(idx: usize, message: String) -> rusqlite::Error {
    conv_err(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, e))
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let created_at: String = row.get(2)?;
    let items: String = row.get(3)?;
    let expected: String = row.get(4)?;
    let delivered: Option<String> = row.get(5)?;
    let status: String = row.get(7)?;
    let priority: String = row.get(8)?;

    Ok(Task {
        id: TaskId(Uuid::parse_str(&id).map_err(|e| conv_err(0, e))?),
        owner_id: OwnerId(Uuid::parse_str(&owner_id).map_err(|e| conv_err(1, e))?),
        created_at: parse_datetime(2, &created_at)?,
        items: serde_json::from_str(&items).map_err(|e| conv_err(3, e))?,
        expected_delivery_date: parse_datetime(4, &expected)?,
        delivered_on: delivered.as_deref().map(|d| parse_datetime(5, d)).transpose()?,
        assigned_by: row.get(6)?,
        status: TaskStatus::from_str(&status).map_err(|e| invalid(7, e))?,
        priority: TaskPriority::from_str(&priority).map_err(|e| invalid(8, e))?,
        notes: row.get(9)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(4)?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| conv_err(0, e))?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_datetime(4, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn owner() -> OwnerId {
        OwnerId(Uuid::new_v4())
    }

    fn make_task(owner_id: OwnerId, created_at: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::new(),
            owner_id,
            created_at,
            items: vec!["Prepare quarterly report".to_string()],
            expected_delivery_date: created_at + Duration::days(7),
            delivered_on: None,
            assigned_by: "Alice Smith".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_one() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let task = make_task(o, Utc::now());
        store.insert(&task).await.unwrap();

        let found = store.find_one(o, task.id).await.unwrap().unwrap();
        assert_eq!(found.id, task.id);
        assert_eq!(found.items, task.items);
        assert_eq!(found.status, TaskStatus::Pending);

        // A different owner sees nothing.
        assert!(store.find_one(owner(), task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let mut task = make_task(o, Utc::now());
        store.insert(&task).await.unwrap();

        task.status = TaskStatus::Completed;
        task.delivered_on = Some(Utc::now());
        task.notes = "shipped".to_string();
        store.update_by_id(&task).await.unwrap();

        let found = store.find_one(o, task.id).await.unwrap().unwrap();
        assert_eq!(found.status, TaskStatus::Completed);
        assert!(found.delivered_on.is_some());
        assert_eq!(found.notes, "shipped");

        // Delete is scoped by owner.
        assert!(!store.delete_by_id(owner(), task.id).await.unwrap());
        assert!(store.delete_by_id(o, task.id).await.unwrap());
        assert!(store.find_one(o, task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_sorts_and_paginates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let base = Utc::now();
        for i in 0..5 {
            store
                .insert(&make_task(o, base - Duration::hours(i)))
                .await
                .unwrap();
        }

        let predicate = Predicate::for_owner(o);
        let plan = QueryPlan {
            sort: SortOrder::CreatedDesc,
            skip: 2,
            limit: Some(2),
        };
        let page = store.find(&predicate, &plan).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].created_at, base - Duration::hours(2));
        assert_eq!(page[1].created_at, base - Duration::hours(3));

        let all = store.find(&predicate, &QueryPlan::unbounded()).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let mut by_assigned = make_task(o, Utc::now());
        by_assigned.assigned_by = "Alice Smith".to_string();
        store.insert(&by_assigned).await.unwrap();

        let mut unrelated = make_task(o, Utc::now());
        unrelated.items = vec!["Water the plants".to_string()];
        unrelated.assigned_by = "Bob".to_string();
        store.insert(&unrelated).await.unwrap();

        let predicate = Predicate::for_owner(o).with(Clause::Search("alice".to_string()));
        let hits = store.find(&predicate, &QueryPlan::unbounded()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, by_assigned.id);

        let predicate = Predicate::for_owner(o).with(Clause::Search("plants".to_string()));
        let hits = store.find(&predicate, &QueryPlan::unbounded()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, unrelated.id);

        let predicate = Predicate::for_owner(o).with(Clause::Search("nomatch".to_string()));
        assert_eq!(store.count(&predicate).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_matches_entries_not_encoded_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let mut task = make_task(o, Utc::now());
        task.items = vec!["Apple".to_string(), "Fig".to_string()];
        store.insert(&task).await.unwrap();

        // A term spanning two adjacent entries exists only in the encoded
        // list, not in any single entry.
        let predicate =
            Predicate::for_owner(o).with(Clause::Search("e\",\"F".to_string()));
        assert_eq!(store.count(&predicate).await.unwrap(), 0);

        let predicate = Predicate::for_owner(o).with(Clause::Search("fig".to_string()));
        assert_eq!(store.count(&predicate).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_finds_quotes_inside_entries() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let mut task = make_task(o, Utc::now());
        task.items = vec!["say \"hi\" to the client".to_string()];
        store.insert(&task).await.unwrap();

        let predicate =
            Predicate::for_owner(o).with(Clause::Search("say \"hi\"".to_string()));
        let hits = store.find(&predicate, &QueryPlan::unbounded()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, task.id);
    }

    #[tokio::test]
    async fn test_like_metacharacters_are_literal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let mut task = make_task(o, Utc::now());
        task.notes = "progress at 50%".to_string();
        store.insert(&task).await.unwrap();

        let predicate = Predicate::for_owner(o).with(Clause::Search("50%".to_string()));
        assert_eq!(store.count(&predicate).await.unwrap(), 1);

        let predicate = Predicate::for_owner(o).with(Clause::Search("5_%".to_string()));
        assert_eq!(store.count(&predicate).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_in_and_deadline_before() {
        let store = SqliteStore::open_in_memory().unwrap();
        let o = owner();
        let now = Utc::now();

        let mut stale = make_task(o, now - Duration::days(10));
        stale.expected_delivery_date = now - Duration::days(3);
        stale.status = TaskStatus::Pending;
        store.insert(&stale).await.unwrap();

        let mut done = make_task(o, now - Duration::days(10));
        done.expected_delivery_date = now - Duration::days(3);
        done.status = TaskStatus::Completed;
        store.insert(&done).await.unwrap();

        let mut fresh = make_task(o, now);
        fresh.expected_delivery_date = now + Duration::days(3);
        store.insert(&fresh).await.unwrap();

        let predicate = Predicate::for_owner(o)
            .with(Clause::StatusIn(vec![
                TaskStatus::Pending,
                TaskStatus::InProgress,
            ]))
            .with(Clause::DeadlineBefore(now));
        assert_eq!(store.count(&predicate).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let store = SqliteStore::open(&path).unwrap();
        let o = owner();
        store.insert(&make_task(o, Utc::now())).await.unwrap();
        assert_eq!(store.count(&Predicate::for_owner(o)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = User {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "salt$hash".to_string(),
            created_at: Utc::now(),
        };
        store.insert_user(&user).await.unwrap();

        let found = store
            .find_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);

        store.update_user_password(user.id, "salt$other").await.unwrap();
        let found = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "salt$other");

        // Duplicate email violates the unique constraint.
        let dup = User {
            id: Uuid::new_v4(),
            ..user
        };
        assert!(store.insert_user(&dup).await.is_err());
    }
}
