//! HTTP API and MCP query bus fronting the orchestrator/store. Owns no
//! business logic beyond request validation, auth enforcement, and
//! error-code mapping; every handler delegates straight to the Store or the
//! Orchestrator/Scheduler.

mod error;
mod extract;
pub mod mcp;
mod routes;
mod state;

pub use state::AppState;

use axum::routing::{get, post, put};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full router: auth, scans, artifacts, stats, schedules,
/// settings, users, health.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.cors_origins);

    Router::new()
        .route("/health", get(routes::settings::health))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/me", get(routes::auth::me))
        .route(
            "/api/auth/change-password",
            put(routes::auth::change_password),
        )
        .route(
            "/api/scans",
            post(routes::scans::create_scan).get(routes::scans::list_scans),
        )
        .route(
            "/api/scans/:id",
            get(routes::scans::get_scan).delete(routes::scans::delete_scan),
        )
        .route(
            "/api/artifacts/:scan_id/:type",
            get(routes::artifacts::get_artifact),
        )
        .route("/api/stats", get(routes::scans::stats))
        .route("/api/hosts/unique", get(routes::scans::unique_hosts))
        .route("/api/vms/unique", get(routes::scans::unique_vms))
        .route("/api/services/unique", get(routes::scans::unique_services))
        .route(
            "/api/schedules",
            post(routes::schedules::create_schedule).get(routes::schedules::list_schedules),
        )
        .route(
            "/api/schedules/:id",
            get(routes::schedules::get_schedule)
                .put(routes::schedules::update_schedule)
                .delete(routes::schedules::delete_schedule),
        )
        .route(
            "/api/schedules/:id/trigger",
            post(routes::schedules::trigger_schedule),
        )
        .route(
            "/api/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route("/api/users", get(routes::users::list_users))
        .route(
            "/api/users/:id/reset-password",
            post(routes::users::reset_password),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .max_age(Duration::from_secs(3600))
}
