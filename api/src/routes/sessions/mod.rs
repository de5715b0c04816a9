use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use util::state::AppState;

mod common;
mod delete;
mod get;
mod post;
mod put;

pub use common::{SessionResponse, checkin_url};
pub use delete::{delete_session, revoke_checkin};
pub use get::{export_attendance_csv, get_checkin_status, get_session, list_attendance};
pub use post::{bulk_mark_attendance, issue_checkin_token, mark_attendance, upload_excuse};
pub use put::edit_session;

use crate::auth::guards::{allow_authenticated, require_instructor};

pub fn sessions_routes(app_state: AppState) -> Router<AppState> {
    let instructor =
        || from_fn_with_state(app_state.clone(), require_instructor);

    Router::new()
        .route("/{session_id}", get(get_session).route_layer(instructor()))
        .route("/{session_id}", put(edit_session).route_layer(instructor()))
        .route("/{session_id}", delete(delete_session).route_layer(instructor()))
        .route(
            "/{session_id}/checkin/token",
            post(issue_checkin_token).route_layer(instructor()),
        )
        .route(
            "/{session_id}/checkin/status",
            get(get_checkin_status).route_layer(instructor()),
        )
        .route(
            "/{session_id}/checkin",
            delete(revoke_checkin).route_layer(instructor()),
        )
        .route(
            "/{session_id}/attendance",
            get(list_attendance).route_layer(instructor()),
        )
        .route(
            "/{session_id}/attendance",
            post(mark_attendance).route_layer(instructor()),
        )
        .route(
            "/{session_id}/attendance/bulk",
            post(bulk_mark_attendance).route_layer(instructor()),
        )
        .route(
            "/{session_id}/attendance/export",
            get(export_attendance_csv).route_layer(instructor()),
        )
        .route(
            "/{session_id}/excuse",
            post(upload_excuse)
                .route_layer(from_fn(allow_authenticated))
                // file limit is 5 MiB, leave room for multipart framing
                .layer(DefaultBodyLimit::max(6 * 1024 * 1024)),
        )
        .with_state(app_state)
}
