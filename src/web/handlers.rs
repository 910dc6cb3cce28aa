//! HTTP request handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::db::{
    validate_interval, validate_name, validate_url, DbError, MonitoredTarget,
    DEFAULT_INTERVAL_MINUTES,
};
use crate::stats::{all_time_stats, summarize, windowed_stats, TargetSummary};

/// Largest accepted stats window (one year of hours).
const STATS_WINDOW_MAX_HOURS: i64 = 8760;

const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");
const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

const FAVICON_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32"><rect width="32" height="32" rx="6" fill="#0f172a"/><polyline points="4,18 10,18 13,9 18,25 21,14 23,18 28,18" fill="none" stroke="#34d399" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/></svg>"##;

/// GET / - dashboard page with the current targets embedded.
pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.store.get_targets().unwrap_or_default();
    let summaries: Vec<TargetSummary> = targets.iter().map(summarize).collect();
    let targets_json = serde_json::to_string(&summaries)
        .unwrap_or_else(|_| "[]".to_string())
        // Keep any literal "</script>" inside target fields from closing the
        // script tag early.
        .replace("</", "<\\/");

    let content = DASHBOARD_TEMPLATE.replace("{{targets_json}}", &targets_json);
    let page = LAYOUT_TEMPLATE
        .replace("{{title}}", "Pingwatch")
        .replace("{{content}}", &content);

    Html(page)
}

/// GET /favicon.ico
pub async fn handle_favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], FAVICON_SVG)
}

/// GET /api/targets - all targets, newest first.
pub async fn handle_get_targets(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_targets() {
        Ok(targets) => {
            let summaries: Vec<TargetSummary> = targets.iter().map(summarize).collect();
            Json(summaries).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTargetRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    /// Poll interval in minutes.
    pub interval: Option<i64>,
}

/// POST /api/targets - register a new target.
pub async fn handle_create_target(
    State(state): State<AppState>,
    Json(req): Json<CreateTargetRequest>,
) -> impl IntoResponse {
    let name = req.name.as_deref().unwrap_or("");
    let url = req.url.as_deref().unwrap_or("");
    let interval = req.interval.unwrap_or(DEFAULT_INTERVAL_MINUTES);

    let mut target = match MonitoredTarget::new(name, url, interval, Utc::now()) {
        Ok(target) => target,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.store.add_target(&mut target) {
        Ok(_) => (StatusCode::CREATED, Json(summarize(&target))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// GET /api/targets/{id}
pub async fn handle_get_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_target(id) {
        Ok(target) => Json(summarize(&target)).into_response(),
        Err(DbError::NotFound) => (StatusCode::NOT_FOUND, "Target not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTargetRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    /// Poll interval in minutes.
    pub interval: Option<i64>,
    pub is_active: Option<bool>,
}

/// PUT /api/targets/{id} - partial update; absent fields are left alone.
///
/// Every supplied field is validated before anything is persisted, so a bad
/// request leaves the stored record untouched.
pub async fn handle_update_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTargetRequest>,
) -> impl IntoResponse {
    let mut target = match state.store.get_target(id) {
        Ok(target) => target,
        Err(DbError::NotFound) => {
            return (StatusCode::NOT_FOUND, "Target not found").into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        target.name = name.trim().to_string();
    }
    if let Some(url) = &req.url {
        let url = url.trim();
        if let Err(e) = validate_url(url) {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        target.url = url.to_string();
    }
    if let Some(interval) = req.interval {
        if let Err(e) = validate_interval(interval) {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        target.interval_minutes = interval;
    }
    if let Some(is_active) = req.is_active {
        target.is_active = is_active;
    }
    target.updated_at = Utc::now();

    // Config columns only; a probe completing concurrently keeps its stats.
    match state.store.update_config(&target) {
        Ok(()) => Json(summarize(&target)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// DELETE /api/targets/{id}
///
/// When an admin token is configured, the request must carry it in the
/// `x-admin-token` header.
pub async fn handle_delete_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(expected) = &state.config.admin_token {
        let provided = headers.get("x-admin-token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, "Admin token required").into_response();
        }
    }

    match state.store.delete_target(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(DbError::NotFound) => (StatusCode::NOT_FOUND, "Target not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// PATCH /api/targets/{id}/toggle - pause or resume polling.
pub async fn handle_toggle_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let mut target = match state.store.get_target(id) {
        Ok(target) => target,
        Err(DbError::NotFound) => {
            return (StatusCode::NOT_FOUND, "Target not found").into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    target.is_active = !target.is_active;
    target.updated_at = Utc::now();

    match state.store.update_config(&target) {
        Ok(()) => Json(summarize(&target)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub window_hours: Option<i64>,
}

/// GET /api/targets/{id}/stats - all-time stats, or windowed stats when
/// `window_hours` is given.
pub async fn handle_target_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    let target = match state.store.get_target(id) {
        Ok(target) => target,
        Err(DbError::NotFound) => {
            return (StatusCode::NOT_FOUND, "Target not found").into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    match query.window_hours {
        Some(hours) if !(1..=STATS_WINDOW_MAX_HOURS).contains(&hours) => (
            StatusCode::BAD_REQUEST,
            format!("window_hours must be between 1 and {}", STATS_WINDOW_MAX_HOURS),
        )
            .into_response(),
        Some(hours) => Json(windowed_stats(&target, hours, Utc::now())).into_response(),
        None => Json(all_time_stats(&target)).into_response(),
    }
}

/// GET /api/health
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    Json(json!({
        "status": "ok",
        "uptimeSeconds": (now - state.started_at).num_seconds(),
        "timestamp": now.to_rfc3339(),
    }))
}

/// GET /api/site-uptime - how long this instance has been monitoring.
pub async fn handle_site_uptime(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "startedAt": state.started_at.to_rfc3339(),
        "uptimeSeconds": (Utc::now() - state.started_at).num_seconds(),
    }))
}
