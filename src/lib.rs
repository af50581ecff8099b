//! # Taskdeck
//!
//! A self-hosted task delivery tracker.
//!
//! This library provides:
//! - An HTTP API for creating, querying and updating tasks
//! - A task lifecycle engine with automatic overdue detection
//! - Filtered, paginated, date-bounded queries over a per-user task collection
//! - Aggregate statistics derived from the same collection
//!
//! ## Task Flow
//! 1. Receive an authenticated request with a verified owner id
//! 2. Build an owner-scoped query or mutation
//! 3. Execute it against the storage backend
//! 4. Normalize status on every write path
//!
//! ## Modules
//! - `task`: task records, lifecycle rules, query builder, statistics, service
//! - `store`: storage trait and the SQLite implementation
//! - `users`: user accounts and password hashing
//! - `api`: HTTP routes, JWT auth and error mapping

pub mod api;
pub mod config;
pub mod store;
pub mod task;
pub mod users;

pub use config::Config;
