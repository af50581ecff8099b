//! HTTP router and server bootstrap.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{auth, export, tasks};
use crate::config::Config;
use crate::store::SqliteStore;
use crate::task::TaskService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task lifecycle and query engine.
    pub tasks: TaskService,
    /// Storage handle; also serves user account lookups.
    pub store: Arc<SqliteStore>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    tracing::info!("database ready at {}", config.database_path.display());

    let state = Arc::new(AppState {
        tasks: TaskService::new(store.clone()),
        store,
        config: config.clone(),
    });

    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/change-password", put(auth::change_password))
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/tasks/stats", get(tasks::get_task_stats))
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/export/xlsx", get(export::export_xlsx))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    match config
        .cors_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
    {
        Some(origin) if !config.dev_mode => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::permissive(),
    }
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
