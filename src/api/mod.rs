//! HTTP API layer.
//!
//! Routing, JWT auth and error mapping around the task core. The auth
//! middleware supplies the verified owner id every task operation is
//! scoped to.

pub mod auth;
pub mod error;
pub mod export;
pub mod routes;
pub mod tasks;

pub use routes::{serve, AppState};
