use crate::response::ApiResponse;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde_json::{Value, json};

/// Builds the `/health` route group.
///
/// This includes a single `GET /health` endpoint that returns a basic
/// success message. Useful for uptime checks, load balancers, or deployment
/// health monitoring.
pub fn health_routes() -> Router<util::state::AppState> {
    Router::new().route("/", get(health_check))
}

/// GET /health
///
/// Returns a simple success response to indicate the API is running.
///
/// ### Response
/// - `200 OK`
///
/// ```json
/// {
///   "success": true,
///   "data": { "status": "ok", "version": "0.1.0" },
///   "message": "Health check passed"
/// }
/// ```
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Value>::success(
        json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
        "Health check passed",
    ))
}

#[cfg(test)]
mod tests {
    use super::health_check;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;
    use serde_json::Value;

    #[tokio::test]
    async fn health_check_returns_ok_json() {
        let response = health_check().await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["message"], "Health check passed");
    }
}
