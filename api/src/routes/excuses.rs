use axum::{
    Json, Router,
    body::Body,
    extract::Path,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio_util::io::ReaderStream;

use crate::auth::guards::{Empty, allow_authenticated};
use crate::response::ApiResponse;
use crate::services::excuses::excuses_dir;

pub fn excuses_routes() -> Router<util::state::AppState> {
    Router::new().route(
        "/{filename}",
        get(download_excuse).route_layer(from_fn(allow_authenticated)),
    )
}

/// GET `/api/excuses/{filename}`
///
/// Stream a stored excuse document back to an authenticated caller.
pub async fn download_excuse(Path(filename): Path<String>) -> Response {
    // Stored names are generated server-side; anything with path syntax in
    // it never came from us.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<Empty>::error("File not found")),
        )
            .into_response();
    }

    let path = excuses_dir().join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Empty>::error("File not found")),
            )
                .into_response();
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or(HeaderValue::from_static("attachment")),
    );

    let stream = ReaderStream::new(file);
    (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
}
