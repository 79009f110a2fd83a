use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use rust_embed::RustEmbed;

use crate::AppState;

/// The dashboard page and its assets, embedded at compile time.
#[derive(RustEmbed)]
#[folder = "../../frontend/"]
struct DashboardAssets;

pub fn static_router() -> Router<AppState> {
    Router::new().fallback(serve_static)
}

async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(content) = DashboardAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
        return ([(header::CONTENT_TYPE, mime)], content.data.into_owned()).into_response();
    }

    // Unknown API paths are real 404s; anything else gets the page.
    if path.starts_with("api/") {
        return StatusCode::NOT_FOUND.into_response();
    }
    match DashboardAssets::get("index.html") {
        Some(index) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
            index.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Dashboard page not embedded").into_response(),
    }
}
