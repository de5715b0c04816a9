//! HTTP route entry point for `/api/...`.
//!
//! Routes are organized by resource, each protected via the appropriate
//! access control middleware:
//! - `/health` → health check (public)
//! - `/courses` → session listing/creation, roster, stats, overview
//! - `/sessions` → session editing, check-in tokens, attendance ledger
//! - `/attendance` → record deletion
//! - `/excuses` → excuse document downloads
//!
//! The public self-check-in endpoints live in [`checkin`] and are mounted
//! at the server root, outside the `/api` namespace.

use axum::Router;
use util::state::AppState;

pub mod attendance;
pub mod checkin;
pub mod courses;
pub mod excuses;
pub mod health;
pub mod sessions;

use attendance::attendance_routes;
use courses::courses_routes;
use excuses::excuses_routes;
use health::health_routes;
use sessions::sessions_routes;

/// Builds the complete `/api` router.
///
/// The returned router carries its state and mounts all API routes under
/// their respective base paths. Authentication and role guards are applied
/// per route inside the resource modules.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/courses", courses_routes(app_state.clone()))
        .nest("/sessions", sessions_routes(app_state.clone()))
        .nest("/attendance", attendance_routes(app_state.clone()))
        .nest("/excuses", excuses_routes())
        .with_state(app_state)
}
