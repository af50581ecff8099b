//! JWT auth for the task API (multi-user).
//!
//! - Clients register or log in with email + password
//! - The server returns a JWT carrying the user id
//! - All task endpoints require `Authorization: Bearer <jwt>`; the verified
//!   user id from the token is the owner scope for every task operation
//!
//! # Security notes
//! - Login uses a single generic error for unknown email and wrong password
//!   to prevent account enumeration, with a dummy hash check to keep timing
//!   uniform.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::error::ApiError;
use super::routes::AppState;
use crate::users::{self, User, UserProfile};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject: the user id.
    sub: String,
    /// Display name (for auditing).
    #[serde(default)]
    usr: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// The verified identity attached to a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &User) -> Result<String, ApiError> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id.to_string(),
        usr: user.name.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign JWT: {}", e);
        ApiError::Internal("Server error".to_string())
    })
}

fn verify_jwt(token: &str, secret: &str) -> Option<Claims> {
    let validation = Validation::default();
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    users::validate_registration(&req.name, &req.email, &req.password)
        .map_err(ApiError::Validation)?;

    let email = req.email.trim().to_lowercase();
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest(
            "User already exists with this email".to_string(),
        ));
    }

    let user = User::new(&req.name, &req.email, &req.password, Utc::now());
    state.store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, "user registered");

    let token = issue_jwt(&state.config.jwt_secret, state.config.jwt_ttl_days, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "token": token,
            "user": UserProfile::from(&user),
        })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let account = state.store.find_user_by_email(&email).await?;

    let valid = match &account {
        Some(user) => users::verify_password(&req.password, &user.password_hash),
        None => {
            // Dummy verification to keep response timing uniform.
            let _ = users::verify_password(&req.password, "00$00");
            false
        }
    };

    let user = match (valid, account) {
        (true, Some(user)) => user,
        _ => {
            return Err(ApiError::Unauthorized(
                "Invalid email or password".to_string(),
            ))
        }
    };

    let token = issue_jwt(&state.config.jwt_secret, state.config.jwt_ttl_days, &user)?;
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": UserProfile::from(&user),
    })))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    axum::Extension(auth): axum::Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .store
        .find_user_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid user".to_string()))?;

    if !users::verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    users::validate_new_password(&req.new_password).map_err(ApiError::Validation)?;

    let new_hash = users::hash_password(&req.new_password);
    state.store.update_user_password(user.id, &new_hash).await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully",
    })))
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    axum::Extension(auth): axum::Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .store
        .find_user_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid user".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}

/// Middleware requiring a valid bearer token; inserts [`AuthUser`] into
/// request extensions.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return unauthorized("Missing Authorization header");
    }

    let Some(claims) = verify_jwt(token, &state.config.jwt_secret) else {
        return unauthorized("Invalid or expired token");
    };
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return unauthorized("Invalid token subject");
    };

    req.extensions_mut().insert(AuthUser {
        id: user_id,
        name: claims.usr,
    });
    next.run(req).await
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}
