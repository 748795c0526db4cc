use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use rust_embed::RustEmbed;

use crate::AppState;

/// Single-page backtest UI, embedded at compile time.
#[derive(RustEmbed)]
#[folder = "dashboard/"]
struct DashboardAssets;

pub fn static_router() -> Router<AppState> {
    Router::new().fallback(serve_static)
}

async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(content) = DashboardAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            [(header::CONTENT_TYPE, mime.as_ref().to_string())],
            content.data.into_owned(),
        )
            .into_response();
    }

    // SPA fallback: unknown paths get the index page
    match DashboardAssets::get("index.html") {
        Some(index) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
            index.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Dashboard not bundled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    use crate::{router, AppState};

    use super::*;

    async fn fetch(uri: &str) -> (StatusCode, String, String) {
        let app = router(AppState::new(Arc::new(replay::ReplayMarketData::new()), None));
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let mime = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, mime, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn root_serves_index() {
        let (status, mime, body) = fetch("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(mime.starts_with("text/html"));
        assert!(body.contains("Backtest"));
    }

    #[tokio::test]
    async fn assets_get_their_content_type() {
        let (status, mime, _) = fetch("/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(mime.contains("javascript"), "{mime}");
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_index() {
        let (status, mime, _) = fetch("/some/client/route").await;
        assert_eq!(status, StatusCode::OK);
        assert!(mime.starts_with("text/html"));
    }
}
