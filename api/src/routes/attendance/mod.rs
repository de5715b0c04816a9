use axum::{Router, middleware::from_fn_with_state, routing::delete};
use util::state::AppState;

mod delete;

pub use delete::delete_record;

use crate::auth::guards::require_instructor;

pub fn attendance_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/{record_id}",
            delete(delete_record)
                .route_layer(from_fn_with_state(app_state.clone(), require_instructor)),
        )
        .with_state(app_state)
}
