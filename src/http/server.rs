//! Path-addressed object API server
//!
//! Maps HTTP verbs onto the file store at `/<bucket>/<key>`:
//! - PUT streams the body to disk and answers with the content digest
//! - GET streams the object back, full or as a single byte range
//! - HEAD answers with the same headers as GET and no body
//! - DELETE unlinks the backing file
//!
//! Bodies are streamed in both directions; no object is ever held in
//! memory whole.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path as RequestPath, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::range::{self, ByteRange};
use crate::store::digest::COPY_BUFFER_SIZE;
use crate::store::{FileStore, ObjectMeta, ObjectPath};

/// Shared state for the object API
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
}

/// Object API server
pub struct ObjectServer {
    bind_addr: String,
    state: AppState,
}

impl ObjectServer {
    /// Create a new object server over a file store
    pub fn new(bind_addr: String, store: FileStore) -> Self {
        Self {
            bind_addr,
            state: AppState {
                store: Arc::new(store),
            },
        }
    }

    /// Start serving; runs until the shutdown future resolves and
    /// in-flight requests have drained
    pub async fn run<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state.clone());

        info!("object API listening on {}", self.bind_addr);

        let listener = TcpListener::bind(&self.bind_addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Build the object API router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Catch-all route - addressing is path-based
        .route("/", any(handle_root))
        .route("/*path", any(handle_object))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

async fn handle_root(method: Method) -> Response {
    match method {
        Method::PUT | Method::GET | Method::HEAD | Method::DELETE => {
            Error::InvalidPath("missing bucket and key".to_string()).into_response()
        }
        _ => method_not_allowed(),
    }
}

async fn handle_object(
    State(state): State<AppState>,
    RequestPath(path): RequestPath<String>,
    headers: HeaderMap,
    method: Method,
    request: Request<Body>,
) -> Response {
    if !matches!(
        method,
        Method::PUT | Method::GET | Method::HEAD | Method::DELETE
    ) {
        return method_not_allowed();
    }

    let object = match ObjectPath::parse(&path) {
        Ok(object) => object,
        Err(e) => return e.into_response(),
    };

    let result = match method {
        Method::PUT => put_object(&state, &object, request).await,
        Method::GET => get_object(&state, &object, &headers).await,
        Method::HEAD => head_object(&state, &object).await,
        _ => delete_object(&state, &object).await,
    };

    result.unwrap_or_else(|e| e.into_response())
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// PUT /bucket/key → store an object, answer with its digest
async fn put_object(
    state: &AppState,
    object: &ObjectPath,
    request: Request<Body>,
) -> Result<Response> {
    let body = request
        .into_body()
        .into_data_stream()
        .map_err(io::Error::other);

    let etag = state.store.put(object, body).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "etag": etag }))).into_response())
}

/// GET /bucket/key → stream an object back, full or ranged
async fn get_object(
    state: &AppState,
    object: &ObjectPath,
    headers: &HeaderMap,
) -> Result<Response> {
    let (file, meta) = state.store.open(object).await?;

    // Second, independent pass over the bytes; the ETag is always the
    // digest of the complete object, ranged or not
    let etag = state.store.digest(object).await?;

    if let Some(value) = headers.get(header::RANGE) {
        let value = value
            .to_str()
            .map_err(|_| Error::InvalidRange("unreadable range header".to_string()))?;
        let span = range::parse_range(value, meta.size)?;
        return ranged_response(file, &meta, &etag, span).await;
    }

    debug!("serving {} ({} bytes)", object, meta.size);

    let body = Body::from_stream(ReaderStream::with_capacity(file, COPY_BUFFER_SIZE));
    Ok(object_headers(
        Response::builder().status(StatusCode::OK),
        meta.size,
        &meta,
        &etag,
    )
    .body(body)
    .unwrap())
}

/// Serve a validated byte span of an open object
async fn ranged_response(
    mut file: File,
    meta: &ObjectMeta,
    etag: &str,
    span: ByteRange,
) -> Result<Response> {
    file.seek(SeekFrom::Start(span.start)).await?;

    let limited = file.take(span.len());
    let body = Body::from_stream(ReaderStream::with_capacity(limited, COPY_BUFFER_SIZE));

    Ok(object_headers(
        Response::builder().status(StatusCode::PARTIAL_CONTENT),
        span.len(),
        meta,
        etag,
    )
    .header(header::CONTENT_RANGE, span.content_range(meta.size))
    .body(body)
    .unwrap())
}

/// HEAD /bucket/key → same headers as GET, no body; range headers
/// are ignored here, not validated
async fn head_object(state: &AppState, object: &ObjectPath) -> Result<Response> {
    let meta = state.store.metadata(object).await?;
    let etag = state.store.digest(object).await?;

    Ok(object_headers(
        Response::builder().status(StatusCode::OK),
        meta.size,
        &meta,
        &etag,
    )
    .body(Body::empty())
    .unwrap())
}

/// DELETE /bucket/key → remove the backing file
async fn delete_object(state: &AppState, object: &ObjectPath) -> Result<Response> {
    state.store.delete(object).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response()
}

/// Common response headers for GET/HEAD; `served` is the byte count
/// of this response's body, which differs from the object size for
/// range requests
fn object_headers(
    builder: axum::http::response::Builder,
    served: u64,
    meta: &ObjectMeta,
    etag: &str,
) -> axum::http::response::Builder {
    builder
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, served.to_string())
        .header(header::ETAG, format!("\"{etag}\""))
        .header(header::LAST_MODIFIED, http_date(meta.modified))
}

/// Format a modification time as an HTTP date (RFC 7231, UTC)
fn http_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn test_router() -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let state = AppState {
            store: Arc::new(store),
        };
        (router(state), dir)
    }

    fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (app, _dir) = test_router();

        let response = send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let put_body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(put_body["etag"], HELLO_SHA256);

        let response = send(&app, request(Method::GET, "/docs/readme.txt", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "content-length"), "5");
        assert_eq!(
            header_str(&response, "etag"),
            format!("\"{HELLO_SHA256}\"")
        );
        assert!(header_str(&response, "last-modified").ends_with(" GMT"));
        assert_eq!(body_bytes(response).await, b"hello");
    }

    #[tokio::test]
    async fn test_range_request() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let req = Request::builder()
            .method(Method::GET)
            .uri("/docs/readme.txt")
            .header("range", "bytes=1-3")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&response, "content-range"), "bytes 1-3/5");
        assert_eq!(header_str(&response, "content-length"), "3");
        // ETag is still the digest of the full object
        assert_eq!(
            header_str(&response, "etag"),
            format!("\"{HELLO_SHA256}\"")
        );
        assert_eq!(body_bytes(response).await, b"ell");
    }

    #[tokio::test]
    async fn test_open_ended_range() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let req = Request::builder()
            .method(Method::GET)
            .uri("/docs/readme.txt")
            .header("range", "bytes=2-")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&response, "content-range"), "bytes 2-4/5");
        assert_eq!(body_bytes(response).await, b"llo");
    }

    #[tokio::test]
    async fn test_range_end_clamped() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let req = Request::builder()
            .method(Method::GET)
            .uri("/docs/readme.txt")
            .header("range", "bytes=3-100")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&response, "content-range"), "bytes 3-4/5");
        assert_eq!(body_bytes(response).await, b"lo");
    }

    #[tokio::test]
    async fn test_range_not_satisfiable() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let req = Request::builder()
            .method(Method::GET)
            .uri("/docs/readme.txt")
            .header("range", "bytes=10-20")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(header_str(&response, "content-range"), "bytes */5");
    }

    #[tokio::test]
    async fn test_range_bad_syntax() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        for value in ["bytes=-3", "bytes=a-b", "chunks=0-1", "bytes=0-1,3-4"] {
            let req = Request::builder()
                .method(Method::GET)
                .uri("/docs/readme.txt")
                .header("range", value)
                .body(Body::empty())
                .unwrap();
            let response = send(&app, req).await;
            assert_eq!(
                response.status(),
                StatusCode::BAD_REQUEST,
                "range header {value:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_head() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let response = send(&app, request(Method::HEAD, "/docs/readme.txt", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "content-length"), "5");
        assert_eq!(
            header_str(&response, "etag"),
            format!("\"{HELLO_SHA256}\"")
        );
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_ignores_range() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        // Even a malformed range header is ignored on HEAD
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/docs/readme.txt")
            .header("range", "nonsense")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "content-length"), "5");
    }

    #[tokio::test]
    async fn test_delete_lifecycle() {
        let (app, _dir) = test_router();
        send(&app, request(Method::PUT, "/docs/readme.txt", "hello")).await;

        let response = send(&app, request(Method::DELETE, "/docs/readme.txt", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, "/docs/readme.txt", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request(Method::DELETE, "/docs/readme.txt", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_never_written_is_not_found() {
        let (app, _dir) = test_router();

        for method in [Method::GET, Method::HEAD, Method::DELETE] {
            let response = send(&app, request(method.clone(), "/no/such-object", Body::empty())).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "method {method}");
        }
    }

    #[tokio::test]
    async fn test_invalid_paths() {
        let (app, _dir) = test_router();

        // Bucket without key
        let response = send(&app, request(Method::PUT, "/docs", "x")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, request(Method::GET, "/docs/", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Traversal attempts
        let response = send(&app, request(Method::GET, "/docs/../secret", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Root path
        let response = send(&app, request(Method::GET, "/", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let (app, _dir) = test_router();

        let response = send(&app, request(Method::POST, "/docs/readme.txt", "x")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&app, request(Method::POST, "/", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_nested_key() {
        let (app, _dir) = test_router();

        let response = send(&app, request(Method::PUT, "/media/photos/2025/cat.jpg", "img")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            request(Method::GET, "/media/photos/2025/cat.jpg", Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"img");
    }

    #[tokio::test]
    async fn test_overwrite_changes_etag() {
        let (app, _dir) = test_router();

        send(&app, request(Method::PUT, "/docs/file", "one")).await;
        let response = send(&app, request(Method::PUT, "/docs/file", "two")).await;
        let put_body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();

        let response = send(&app, request(Method::GET, "/docs/file", Body::empty())).await;
        assert_eq!(
            header_str(&response, "etag"),
            format!("\"{}\"", put_body["etag"].as_str().unwrap())
        );
        assert_eq!(body_bytes(response).await, b"two");
    }

    #[tokio::test]
    async fn test_concurrent_puts_to_distinct_keys() {
        let (app, _dir) = test_router();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let uri = format!("/bucket/object-{i}");
                let content = format!("content for object {i}");
                let response = app
                    .oneshot(request(Method::PUT, &uri, content))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Every object is independently readable with its own content
        for i in 0..8 {
            let uri = format!("/bucket/object-{i}");
            let response = send(&app, request(Method::GET, &uri, Body::empty())).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_bytes(response).await,
                format!("content for object {i}").into_bytes()
            );
        }
    }

    #[tokio::test]
    async fn test_large_object_streams_correctly() {
        let (app, _dir) = test_router();

        // Several copy-buffer multiples, not a round number
        let content = vec![0x5au8; COPY_BUFFER_SIZE * 2 + 123];
        let response = send(&app, request(Method::PUT, "/big/blob", content.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, request(Method::GET, "/big/blob", Body::empty())).await;
        assert_eq!(
            header_str(&response, "content-length"),
            content.len().to_string()
        );
        assert_eq!(body_bytes(response).await, content);

        // A range that crosses a buffer boundary
        let req = Request::builder()
            .method(Method::GET)
            .uri("/big/blob")
            .header("range", format!("bytes={}-{}", COPY_BUFFER_SIZE - 10, COPY_BUFFER_SIZE + 9))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body_bytes(response).await.len(), 20);
    }
}
