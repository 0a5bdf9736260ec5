pub mod handlers;
pub mod pages;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::downloader::DownloadManager;
use crate::errors::Result;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub manager: DownloadManager,
}

const PROGRESS_PREFIX: &str = "/api/progress/";

/// Dispatches one request. Never fails: errors become error responses.
pub async fn route(state: Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    log::debug!("{} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => handlers::index(&state),
        (&Method::POST, "/download") => handlers::submit_form(&state, req).await,
        (&Method::POST, "/api/info") => handlers::api_info(&state, req).await,
        (&Method::POST, "/api/download") => handlers::api_download(&state, req).await,
        (&Method::GET, "/health") => handlers::health(),
        (&Method::GET, p) if p.starts_with(PROGRESS_PREFIX) => {
            handlers::api_progress(&state, &p[PROGRESS_PREFIX.len()..]).await
        }
        (_, "/" | "/download" | "/api/info" | "/api/download" | "/health") => {
            handlers::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        (_, p) if p.starts_with(PROGRESS_PREFIX) => {
            handlers::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => handlers::text_response(StatusCode::NOT_FOUND, "Not found"),
    };

    log::info!("{} {} -> {}", method, path, response.status().as_u16());
    response
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let state = state.clone();
        let remote = conn.remote_addr();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                log::trace!("request from {}", remote);
                async move { Ok::<_, Infallible>(route(state, req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    log::info!("Listening on http://{}", server.local_addr());

    server.with_graceful_shutdown(shutdown).await?;
    log::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::JobState;
    use crate::test_support::{manager_with_fake, wait_for_job, FakeExtractor};
    use serde_json::Value;

    fn state(dir: &std::path::Path) -> (Arc<AppState>, Arc<FakeExtractor>) {
        let (manager, fake) = manager_with_fake(dir);
        let config = AppConfig {
            download_path: dir.to_path_buf(),
            ..AppConfig::default()
        };
        (
            Arc::new(AppState {
                config: Arc::new(config),
                manager,
            }),
            fake,
        )
    }

    async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, String) {
        let response = route(state.clone(), req).await;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn form(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/download")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_form_page() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(&state, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form id=\"form\" method=\"post\" action=\"/download\">"));
        assert!(body.contains(&dir.path().to_string_lossy().to_string()));
    }

    #[tokio::test]
    async fn empty_form_url_is_rejected_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state(dir.path());

        let (status, body) = call(&state, form("url=&media_type=video&quality=720p")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("URL is required"));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn form_download_renders_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(
            &state,
            form("url=https%3A%2F%2Fyoutu.be%2Fabc&media_type=audio&quality=192kbps"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("clip-0.mp3"));
        assert!(dir.path().join("clip-0.mp3").is_file());
    }

    #[tokio::test]
    async fn form_extraction_error_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(
            &state,
            form("url=https%3A%2F%2Fexample.com%2Fpage&media_type=video&quality=1080p"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("ERROR: Unsupported URL: https://example.com/page"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn form_rejects_mismatched_quality() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state(dir.path());

        let (status, body) = call(
            &state,
            form("url=https%3A%2F%2Fyoutu.be%2Fabc&media_type=audio&quality=720p"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Unsupported audio quality"));
        assert!(body.contains("value=\"https://youtu.be/abc\""));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn api_download_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(
            &state,
            json(
                "/api/download",
                serde_json::json!({ "url": "https://youtu.be/abc", "download_type": "video", "quality": "480p" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["success"], true);
        let id = reply["download_id"].as_str().unwrap().to_string();

        assert!(matches!(
            wait_for_job(&state.manager, &id).await,
            JobState::Completed { .. }
        ));

        let (status, body) = call(&state, get(&format!("/api/progress/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        let progress: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(progress["status"], "completed");
    }

    #[tokio::test]
    async fn api_download_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state(dir.path());

        let (status, body) = call(&state, json("/api/download", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["success"], false);
        assert_eq!(reply["error"], "URL is required");
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_progress_id() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(&state, get("/api/progress/nope")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"unknown"}"#);
    }

    #[tokio::test]
    async fn api_info_returns_summary() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let (status, body) = call(
            &state,
            json("/api/info", serde_json::json!({ "url": "https://youtu.be/abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["success"], true);
        assert_eq!(reply["data"]["title"], "Fake clip");

        let (status, _) = call(
            &state,
            json("/api/info", serde_json::json!({ "url": "https://example.com/" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/info")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state(dir.path());

        let big = format!("url={}", "a".repeat(handlers::MAX_BODY_BYTES + 1));
        let (status, _) = call(&state, form(&big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state(dir.path());

        assert_eq!(call(&state, get("/nowhere")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(&state, get("/download")).await.0, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(call(&state, get("/health")).await.0, StatusCode::OK);
    }
}
