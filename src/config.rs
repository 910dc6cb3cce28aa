//! Configuration module for Pingwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 7860)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "pingwatch.db")
    pub db_path: String,
    /// Shared secret required by destructive API calls when set.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 7860,
            db_path: "pingwatch.db".to_string(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PINGWATCH_HTTP_PORT`: HTTP port (default: 7860)
    /// - `PINGWATCH_DB_PATH`: database file path (default: "pingwatch.db")
    /// - `PINGWATCH_ADMIN_TOKEN`: shared secret required to delete targets
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("PINGWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("PINGWATCH_DB_PATH") {
            if !db_path.is_empty() {
                cfg.db_path = db_path;
            }
        }

        if let Ok(token) = env::var("PINGWATCH_ADMIN_TOKEN") {
            if !token.is_empty() {
                cfg.admin_token = Some(token);
            }
        }

        cfg
    }
}
