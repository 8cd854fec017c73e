//! Local book server
//!
//! The rendering engine loads books over HTTP, so each session serves its
//! book file from a loopback listener:
//!
//! ```text
//!  GET /book/<file name>  -> raw bytes, content type from the extension
//!  GET /health            -> {"status": "healthy", ...}
//! ```
//!
//! Only the session's own file is served. The server stops when
//! [`BookServer::shutdown`] is called or the handle is dropped.

use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};

/// The file a server exposes
#[derive(Debug, Clone)]
pub struct BookFile {
    name: Arc<str>,
    path: Arc<PathBuf>,
}

impl BookFile {
    /// Describe a book on disk; the URL name is its file name
    pub fn new(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Not a book file: {}", path.display())))?;

        Ok(Self {
            name: Arc::from(name),
            path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    /// Lowercased extension, passed to the engine as a format hint
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    book: String,
}

async fn health_check(State(book): State<BookFile>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        book: book.name().to_string(),
    })
}

/// Create the book router
pub fn router(book: BookFile) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/book/:name", get(serve_book))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(book)
}

/// Serve the session's book file
async fn serve_book(State(book): State<BookFile>, Path(name): Path<String>) -> Result<Response> {
    if name != book.name() {
        return Err(AppError::NotFound(format!("Book not found: {}", name)));
    }

    let bytes = tokio::fs::read(book.path()).await?;
    tracing::debug!(book = %name, size = bytes.len(), "serving book");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, guess_content_type(&name))
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", name),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Guess content type from file extension
pub fn guess_content_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_lowercase().as_str() {
        "epub" => "application/epub+zip",
        "pdf" => "application/pdf",
        "mobi" => "application/x-mobipocket-ebook",
        "azw3" | "azw" => "application/vnd.amazon.mobi8-ebook",
        "cbz" => "application/vnd.comicbook+zip",
        "cbr" => "application/vnd.comicbook-rar",
        "fb2" => "application/x-fictionbook+xml",
        "txt" => "text/plain; charset=utf-8",
        "html" | "xhtml" => "application/xhtml+xml",
        _ => "application/octet-stream",
    }
}

/// Running server for one book
pub struct BookServer {
    addr: SocketAddr,
    url: String,
    book: BookFile,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BookServer {
    /// Bind `host:port` (port 0 picks a free one) and start serving `path`
    pub async fn start(host: &str, port: u16, path: impl AsRef<FsPath>) -> Result<Self> {
        let book = BookFile::new(path)?;
        if !tokio::fs::try_exists(book.path()).await? {
            return Err(AppError::NotFound(format!(
                "Book file does not exist: {}",
                book.path().display()
            )));
        }

        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        let url = book_url(&addr, book.name());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(book.clone());
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // a dropped sender also stops the server
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Book server failed: {}", e);
            }
        });

        tracing::info!(url = %url, "Book server listening on {}", addr);

        Ok(Self {
            addr,
            url,
            book,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL the engine should load the book from
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn book(&self) -> &BookFile {
        &self.book
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Book server task ended abnormally: {}", e);
            }
        }
        tracing::info!("Book server on {} stopped", self.addr);
    }
}

impl Drop for BookServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn book_url(addr: &SocketAddr, name: &str) -> String {
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else if addr.is_ipv6() {
        format!("[{}]", addr.ip())
    } else {
        addr.ip().to_string()
    };
    format!(
        "http://{}:{}/book/{}",
        host,
        addr.port(),
        urlencoding::encode(name)
    )
}
