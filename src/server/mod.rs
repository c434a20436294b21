//! Log directory server
//!
//! Serves a directory over HTTP so the view and archive files can be read from a
//! browser. Files go through `ServeDir` (ranges, conditional requests, MIME types);
//! directories get a plain link listing.

use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Path as UrlPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared root directory
type Root = Arc<PathBuf>;

/// Handle to control the running server
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Get the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server gracefully
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if receiver is already dropped
            let _ = tx.send(());
        }
        Ok(())
    }
}

/// Build the router serving `directory`
pub fn router(directory: impl Into<PathBuf>) -> Router {
    let root: Root = Arc::new(directory.into());
    Router::new()
        .route("/", get(serve_root))
        .route("/*path", get(serve_path))
        .layer(TraceLayer::new_for_http())
        .with_state(root)
}

/// Start serving `directory` on all interfaces
///
/// # Arguments
/// * `port` - Port to listen on, 0 lets the OS pick one
/// * `directory` - Directory to expose
///
/// # Returns
/// A `ServerHandle` that can be used to shut down the server
pub async fn start(port: u16, directory: impl Into<PathBuf>) -> Result<ServerHandle> {
    let directory = directory.into();
    let app = router(directory.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind log server to {}", addr))?;
    let bound_addr = listener.local_addr()?;

    info!("Serving {} on http://{}", directory.display(), bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                info!("Log server shutting down");
            })
            .await
            .ok();
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        addr: bound_addr,
    })
}

async fn serve_root(State(root): State<Root>) -> Response {
    list_directory(&root).await
}

async fn serve_path(
    State(root): State<Root>,
    UrlPath(path): UrlPath<String>,
    request: Request,
) -> Response {
    let Some(target) = resolve(&root, &path) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };

    let is_dir = tokio::fs::metadata(&target)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        let uri_path = request.uri().path();
        if !uri_path.ends_with('/') {
            let location = format!("{}/", uri_path);
            return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)])
                .into_response();
        }
        return list_directory(&target).await;
    }

    debug!(path = %target.display(), "Serving file");
    let response = match ServeDir::new(root.as_path()).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    };

    if is_log_file(&path) {
        label_as_text(response)
    } else {
        response
    }
}

/// Primary, view and archive files all carry `.log` somewhere in their name
fn is_log_file(path: &str) -> bool {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(".log"))
        .unwrap_or(false)
}

/// Archive suffixes are not known extensions; show them as text instead of a download
fn label_as_text(mut response: Response) -> Response {
    let unknown = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v == "application/octet-stream")
        .unwrap_or(false);
    if unknown {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    response
}

/// Map a request path onto the root, rejecting anything that could escape it
fn resolve(root: &Path, request: &str) -> Option<PathBuf> {
    let mut target = root.to_path_buf();
    for component in Path::new(request).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(target)
}

async fn list_directory(dir: &Path) -> Response {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(r) => r,
        Err(e) => return io_error_response(&e, dir),
    };

    let mut names = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => return io_error_response(&e, dir),
        }
    }
    names.sort();

    Html(render_listing(&names)).into_response()
}

/// `<pre>` listing with one link per entry
fn render_listing(names: &[String]) -> String {
    let mut body = String::from("<pre>\n");
    for name in names {
        body.push_str(&format!(
            "<a href=\"./{}\">{}</a>\n",
            encode_href(name),
            escape_html(name)
        ));
    }
    body.push_str("</pre>\n");
    body
}

fn encode_href(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn io_error_response(e: &io::Error, path: &Path) -> Response {
    match e.kind() {
        io::ErrorKind::NotFound => (StatusCode::NOT_FOUND, "404 page not found").into_response(),
        io::ErrorKind::PermissionDenied => {
            (StatusCode::FORBIDDEN, "403 Forbidden").into_response()
        }
        _ => {
            warn!(path = %path.display(), error = %e, "Failed to serve path");
            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
        }
    }
}
