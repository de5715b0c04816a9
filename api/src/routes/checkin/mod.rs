//! Public self-check-in endpoints. These are mounted at the root (not under
//! `/api`) and require no authentication: the QR code URL is the only
//! credential a student presents.

use axum::{
    Router,
    routing::{get, post},
};
use util::state::AppState;

mod common;
mod get;
mod post;

pub use get::probe_token;
pub use post::submit_checkin;

pub fn checkin_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/submit", post(submit_checkin))
        .route("/{token}", get(probe_token))
        .with_state(app_state)
}
