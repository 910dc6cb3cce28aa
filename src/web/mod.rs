//! Web server module.
//!
//! Serves the REST API and the embedded dashboard.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Store,
    /// Process start, reported by the health and site-uptime endpoints.
    pub started_at: DateTime<Utc>,
}

/// Web server for Pingwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Store) -> Self {
        Self {
            state: AppState {
                config,
                store,
                started_at: Utc::now(),
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            .route("/favicon.ico", get(handlers::handle_favicon))
            // Target API
            .route("/api/targets", get(handlers::handle_get_targets))
            .route("/api/targets", post(handlers::handle_create_target))
            .route("/api/targets/{id}", get(handlers::handle_get_target))
            .route("/api/targets/{id}", put(handlers::handle_update_target))
            .route("/api/targets/{id}", delete(handlers::handle_delete_target))
            .route("/api/targets/{id}/toggle", patch(handlers::handle_toggle_target))
            .route("/api/targets/{id}/stats", get(handlers::handle_target_stats))
            // Service endpoints
            .route("/api/health", get(handlers::handle_health))
            .route("/api/site-uptime", get(handlers::handle_site_uptime))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port. Runs until the process
    /// exits.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
