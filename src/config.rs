//! Server configuration.
//!
//! All knobs come from environment variables so the binary can run under
//! systemd or a container without a config file. The `Config` value is
//! constructed once in `main` and passed down explicitly.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Runtime configuration for the server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Secret used to sign and verify JWTs.
    pub jwt_secret: String,
    /// JWT lifetime in days.
    pub jwt_ttl_days: i64,
    /// Allowed CORS origin. `None` means permissive (dev).
    pub cors_origin: Option<String>,
    /// Dev mode relaxes CORS and allows a default JWT secret.
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `HOST` (default `0.0.0.0`)
    /// - `PORT` (default `5000`)
    /// - `DATABASE_PATH` (default `taskdeck.db`)
    /// - `JWT_SECRET` (required unless `DEV_MODE=true`)
    /// - `JWT_TTL_DAYS` (default `30`)
    /// - `FRONTEND_URL` (optional CORS origin)
    /// - `DEV_MODE` (default `false`)
    pub fn from_env() -> Result<Self> {
        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ if dev_mode => "dev-secret-do-not-use-in-production".to_string(),
            _ => bail!("JWT_SECRET must be set when DEV_MODE is not enabled"),
        };

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse::<u16>().context("PORT is not a valid port number")?,
            Err(_) => 5000,
        };

        let jwt_ttl_days = match std::env::var("JWT_TTL_DAYS") {
            Ok(d) => d
                .parse::<i64>()
                .context("JWT_TTL_DAYS is not a valid number")?,
            Err(_) => 30,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_path: std::env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("taskdeck.db")),
            jwt_secret,
            jwt_ttl_days,
            cors_origin: std::env::var("FRONTEND_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            dev_mode,
        })
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
