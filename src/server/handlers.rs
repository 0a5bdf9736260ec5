use hyper::body::{Bytes, HttpBody};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::pages::{index_page, status_page, FormValues};
use super::AppState;
use crate::errors::{AppError, ErrorCategory};

pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct InfoRequest {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDownloadRequest {
    url: Option<String>,
    download_type: Option<String>,
    quality: Option<String>,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Extraction => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Environment => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn build(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn text_response(status: StatusCode, text: &str) -> Response<Body> {
    build(status, "text/plain; charset=utf-8", text.to_string())
}

fn html_response(status: StatusCode, html: String) -> Response<Body> {
    build(status, "text/html; charset=utf-8", html)
}

fn json_response(status: StatusCode, value: &Value) -> Response<Body> {
    build(status, "application/json", value.to_string())
}

fn json_error(err: &AppError) -> Response<Body> {
    json_response(
        status_for(err),
        &json!({ "success": false, "error": err.user_message() }),
    )
}

/// Reads the request body, refusing anything over [`MAX_BODY_BYTES`].
async fn read_body(req: Request<Body>) -> std::result::Result<Bytes, Response<Body>> {
    let too_large = || text_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");

    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.map_or(false, |len| len > MAX_BODY_BYTES) {
        return Err(too_large());
    }

    let mut body = req.into_body();
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            log::warn!("Failed to read request body: {}", e);
            text_response(StatusCode::BAD_REQUEST, "Could not read request body")
        })?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

pub fn index(state: &AppState) -> Response<Body> {
    html_response(
        StatusCode::OK,
        index_page(&FormValues::default(), None, &state.config.download_path),
    )
}

pub fn health() -> Response<Body> {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

/// Plain HTML form post: validates, downloads synchronously, renders the result.
pub async fn submit_form(state: &AppState, req: Request<Body>) -> Response<Body> {
    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let fields: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
    let values = FormValues {
        url: fields.get("url").cloned().unwrap_or_default(),
        media_type: fields.get("media_type").cloned().unwrap_or_default(),
        quality: fields.get("quality").cloned().unwrap_or_default(),
    };

    let request = match state.manager.validate(
        &values.url,
        Some(values.media_type.as_str()),
        Some(values.quality.as_str()),
    ) {
        Ok(request) => request,
        Err(e) => {
            return html_response(
                status_for(&e),
                index_page(&values, Some(e.user_message().as_str()), &state.config.download_path),
            );
        }
    };

    match state.manager.download(&request).await {
        Ok(outcome) => html_response(
            StatusCode::OK,
            status_page(
                "Download complete",
                &format!("Saved to {}", outcome.destination.display()),
            ),
        ),
        Err(e) => html_response(status_for(&e), status_page("Download failed", &e.user_message())),
    }
}

pub async fn api_info(state: &AppState, req: Request<Body>) -> Response<Body> {
    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request: InfoRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return json_error(&AppError::from(e)),
    };

    match state.manager.fetch_info(request.url.as_deref().unwrap_or_default()).await {
        Ok(summary) => json_response(StatusCode::OK, &json!({ "success": true, "data": summary })),
        Err(e) => json_error(&e),
    }
}

/// Starts a background download and answers with its id right away.
pub async fn api_download(state: &AppState, req: Request<Body>) -> Response<Body> {
    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request: ApiDownloadRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return json_error(&AppError::from(e)),
    };

    let validated = state.manager.validate(
        request.url.as_deref().unwrap_or_default(),
        request.download_type.as_deref(),
        request.quality.as_deref(),
    );

    let started = match validated {
        Ok(download) => state.manager.start(download).await,
        Err(e) => Err(e),
    };

    match started {
        Ok(id) => json_response(StatusCode::OK, &json!({ "success": true, "download_id": id })),
        Err(e) => json_error(&e),
    }
}

pub async fn api_progress(state: &AppState, job_id: &str) -> Response<Body> {
    let progress = state.manager.progress(job_id).await;
    match serde_json::to_value(&progress) {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => json_error(&AppError::from(e)),
    }
}
