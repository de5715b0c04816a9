use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{Value, json};
use util::state::AppState;

use crate::response::ApiResponse;

use super::common::{CODE_TOKEN_EXPIRED, CODE_TOKEN_INVALID};
use db::models::{checkin_token, session};

/// GET `/checkin/{token}`
///
/// Public token probe used by the check-in form before it asks for a name.
/// Succeeds with the session title and window while the token is usable.
/// An expired token is deactivated on sight.
pub async fn probe_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> (StatusCode, Json<ApiResponse<Value>>) {
    let db = state.db();

    let fail = |status: StatusCode, code: &str, message: &str| {
        (
            status,
            Json(ApiResponse {
                success: false,
                data: json!({ "code": code }),
                message: message.to_string(),
            }),
        )
    };

    let row = match checkin_token::Model::find_by_token(db, &token).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to look up check-in token");
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Database error",
            );
        }
    };
    let Some(row) = row.filter(|r| r.active) else {
        return fail(
            StatusCode::NOT_FOUND,
            CODE_TOKEN_INVALID,
            "Check-in code is invalid or no longer active",
        );
    };

    if row.is_expired_at(Utc::now()) {
        let session_id = row.session_id;
        if let Err(e) = row.deactivate(db).await {
            tracing::warn!(error = %e, session_id, "failed to deactivate expired token");
        }
        return fail(
            StatusCode::GONE,
            CODE_TOKEN_EXPIRED,
            "Check-in code has expired",
        );
    }

    let session = match session::Model::find_by_id(db, row.session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return fail(
                StatusCode::NOT_FOUND,
                CODE_TOKEN_INVALID,
                "Check-in code is invalid or no longer active",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load session for token");
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Database error",
            );
        }
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({
                "session_title": session.title,
                "start_ts": session.start_ts.to_rfc3339(),
                "end_ts": session.end_ts.to_rfc3339(),
                "location": session.location,
                "expires_at": row.expires_at.to_rfc3339(),
            }),
            "Check-in code is valid",
        )),
    )
}
