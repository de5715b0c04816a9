use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use util::state::AppState;

mod common;
mod get;
mod post;

pub use get::{
    export_overview_csv, get_my_certificate, get_my_stats, get_overview, get_roster,
    get_student_stats, list_sessions,
};
pub use post::{create_session, sync_roster};

use crate::auth::guards::{allow_authenticated, require_instructor};

pub fn courses_routes(app_state: AppState) -> Router<AppState> {
    let instructor =
        || from_fn_with_state(app_state.clone(), require_instructor);

    Router::new()
        .route(
            "/{lms_course_id}/sessions",
            get(list_sessions).route_layer(from_fn(allow_authenticated)),
        )
        .route(
            "/{lms_course_id}/sessions",
            post(create_session).route_layer(instructor()),
        )
        .route(
            "/{lms_course_id}/roster",
            get(get_roster).route_layer(instructor()),
        )
        .route(
            "/{lms_course_id}/roster/sync",
            post(sync_roster).route_layer(instructor()),
        )
        .route(
            "/{lms_course_id}/students/{external_id}/stats",
            get(get_student_stats).route_layer(instructor()),
        )
        .route(
            "/{lms_course_id}/me/stats",
            get(get_my_stats).route_layer(from_fn(allow_authenticated)),
        )
        .route(
            "/{lms_course_id}/me/certificate",
            get(get_my_certificate).route_layer(from_fn(allow_authenticated)),
        )
        .route(
            "/{lms_course_id}/overview",
            get(get_overview).route_layer(instructor()),
        )
        .route(
            "/{lms_course_id}/overview/export",
            get(export_overview_csv).route_layer(instructor()),
        )
        .with_state(app_state)
}
