use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use db::models::user;
use util::state::AppState;

#[derive(serde::Serialize, Default)]
pub struct Empty;

/// Helper to extract and validate the user from request parts, then insert
/// the claims back into the request extensions for handlers to read.
async fn extract_and_insert_authuser(
    req: Request<Body>,
) -> Result<(Request<Body>, AuthUser), (StatusCode, Json<ApiResponse<Empty>>)> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Authentication required")),
            )
        })?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user.clone());
    Ok((req, user))
}

/// Basic guard to ensure the request is authenticated.
pub async fn allow_authenticated(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, _user) = extract_and_insert_authuser(req).await?;

    Ok(next.run(req).await)
}

/// Instructor-only guard. The role lives on the roster row, not in the
/// token, so a stale JWT cannot outlive a demotion.
pub async fn require_instructor(
    State(app_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, user) = extract_and_insert_authuser(req).await?;

    match user::Model::find_by_id(app_state.db(), user.0.sub).await {
        Ok(Some(u)) if u.is_instructor() => Ok(next.run(req).await),
        Ok(_) => Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Instructor access required")),
        )),
        Err(e) => {
            // Deny on DB error (fail-safe)
            tracing::warn!(error = %e, user_id = user.0.sub, "role lookup failed; denying access");
            Err((
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error("Instructor access required")),
            ))
        }
    }
}
