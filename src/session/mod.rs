//! Reader sessions
//!
//! A [`ReaderSession`] owns everything one open book needs: the local book
//! server and the [`ReaderCore`] pointed at it. Nothing is shared between
//! sessions; closing one stops its server and drops its state.

use std::path::Path;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::{persist_events, HighlightRepository, ProgressRepository};
use crate::engine::Backend;
use crate::error::Result;
use crate::highlight::Highlight;
use crate::locator::Locator;
use crate::reader::{ReaderCore, ReaderOptions};
use crate::server::BookServer;

/// Persisted state restored when a book is opened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedState {
    pub location: Option<Locator>,
    pub highlights: Vec<Highlight>,
}

impl SavedState {
    /// Load the stored position and highlights for `book_id`
    pub async fn load(pool: &SqlitePool, book_id: &str) -> Result<Self> {
        let location = ProgressRepository::new(pool).load(book_id).await?;
        let highlights = HighlightRepository::new(pool).list_for_book(book_id).await?;
        Ok(Self {
            location,
            highlights,
        })
    }
}

/// One open book
pub struct ReaderSession<B: Backend> {
    book_id: String,
    server: BookServer,
    core: ReaderCore<B>,
}

impl<B: Backend> ReaderSession<B> {
    /// Start a book server for `book_path` and build a reader core for it.
    ///
    /// Backends without a handshake render immediately; script backends
    /// start rendering once the host reports the script loaded and the
    /// engine posts `initiatedSwiftReader`.
    pub async fn open(
        config: &Config,
        book_path: impl AsRef<Path>,
        backend: B,
        saved: SavedState,
    ) -> Result<Self> {
        let server =
            BookServer::start(&config.server.host, config.server.port, book_path.as_ref()).await?;
        let book_id = server.book().name().to_string();

        let mut options = ReaderOptions::from_config(&config.reader);
        options.extension_hint = server.book().extension();

        tracing::info!(
            book_id = %book_id,
            highlights = saved.highlights.len(),
            resumed = saved.location.is_some(),
            "opening reader session"
        );

        let mut core = ReaderCore::new(backend, server.url(), options)
            .with_saved_state(saved.location, saved.highlights);
        core.open().await;

        Ok(Self {
            book_id,
            server,
            core,
        })
    }

    /// Identifier used for persistence (the served file name)
    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn book_url(&self) -> &str {
        self.server.url()
    }

    pub fn server(&self) -> &BookServer {
        &self.server
    }

    pub fn core(&self) -> &ReaderCore<B> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ReaderCore<B> {
        &mut self.core
    }

    /// Mirror this session's events into the database. The task ends when
    /// the session is closed, after writing everything queued before it.
    pub fn persist_to(&mut self, pool: SqlitePool) -> JoinHandle<()> {
        tokio::spawn(persist_events(
            pool,
            self.book_id.clone(),
            self.core.persistence_feed(),
        ))
    }

    /// Stop the book server and drop all reading state
    pub async fn close(self) {
        let Self {
            book_id,
            server,
            core,
        } = self;
        drop(core);
        server.shutdown().await;
        tracing::info!(book_id = %book_id, "reader session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::engine::testing::{BackendCall, FakeBackend, FakePdfView};
    use crate::engine::PdfBackend;
    use crate::highlight::HighlightColor;
    use serde_json::json;

    fn book_on_disk(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, b"book").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_open_points_core_at_server() {
        let (_dir, path) = book_on_disk("moby.epub");
        let mut session = ReaderSession::open(
            &Config::default(),
            &path,
            FakeBackend::book(),
            SavedState::default(),
        )
        .await
        .unwrap();

        assert_eq!(session.book_id(), "moby.epub");
        assert_eq!(session.core().book_url(), session.book_url());
        assert!(session.core().backend().calls().is_empty());

        let core = session.core_mut();
        core.mark_script_loaded().await;
        core.handle_message("initiatedSwiftReader", &json!(null)).await;

        let BackendCall::Render(request) = &session.core().backend().calls()[0] else {
            panic!("expected render");
        };
        assert_eq!(request.url, session.book_url());
        assert_eq!(request.extension_hint.as_deref(), Some("epub"));

        let addr = session.server().addr();
        session.close().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_pdf_session_is_ready_on_open() {
        let (_dir, path) = book_on_disk("manual.pdf");
        let session = ReaderSession::open(
            &Config::default(),
            &path,
            PdfBackend::new(FakePdfView::new(12)),
            SavedState {
                location: Some(Locator::pdf_page(3, 12)),
                highlights: vec![],
            },
        )
        .await
        .unwrap();

        assert!(session.core().is_ready());
        assert!(session.core().toc_unavailable());
        assert_eq!(
            session.core().backend().view().loaded_url().as_deref(),
            Some(session.book_url())
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_saved_state_round_trip() {
        let pool = test_pool().await;
        let (_dir, path) = book_on_disk("moby.epub");

        let mut session = ReaderSession::open(
            &Config::default(),
            &path,
            FakeBackend::book(),
            SavedState::load(&pool, "moby.epub").await.unwrap(),
        )
        .await
        .unwrap();
        let persisting = session.persist_to(pool.clone());

        let core = session.core_mut();
        core.mark_script_loaded().await;
        core.handle_message("initiatedSwiftReader", &json!(null)).await;
        core.handle_message(
            "selectedText",
            &json!({
                "text": "Call me Ishmael", "value": "epubcfi(/6/4!/4/2,/1:0,/1:15)",
                "x": 0, "y": 0, "width": 10, "height": 10
            }),
        )
        .await;
        let highlight = core.highlight_selection(HighlightColor::Green).await.unwrap();
        core.handle_message(
            "relocate",
            &json!({"cfi": "epubcfi(/6/4!/4/2/1:0)", "fraction": 0.02}),
        )
        .await;

        session.close().await;
        persisting.await.unwrap();

        let saved = SavedState::load(&pool, "moby.epub").await.unwrap();
        assert_eq!(saved.highlights, vec![highlight]);
        assert_eq!(
            saved.location.and_then(|l| l.fragment().map(str::to_string)).as_deref(),
            Some("epubcfi(/6/4!/4/2/1:0)")
        );
    }

    #[tokio::test]
    async fn test_highlight_survives_relocation_burst() {
        let pool = test_pool().await;
        let (_dir, path) = book_on_disk("moby.epub");

        let mut session = ReaderSession::open(
            &Config::default(),
            &path,
            FakeBackend::book(),
            SavedState::default(),
        )
        .await
        .unwrap();
        let persisting = session.persist_to(pool.clone());

        let core = session.core_mut();
        core.mark_script_loaded().await;
        core.handle_message("initiatedSwiftReader", &json!(null)).await;
        core.handle_message(
            "selectedText",
            &json!({
                "text": "Call me Ishmael", "value": "epubcfi(/6/4!/4/2,/1:0,/1:15)",
                "x": 0, "y": 0, "width": 10, "height": 10
            }),
        )
        .await;
        let highlight = core.highlight_selection(HighlightColor::Pink).await.unwrap();
        // far more relocations than the broadcast channel holds, with no yield
        // to the persistence task in between
        for step in 0..100u32 {
            let cfi = format!("epubcfi(/6/4!/4/{}/1:0)", 2 * (step + 1));
            core.handle_message("relocate", &json!({"cfi": cfi, "fraction": 0.5})).await;
        }

        session.close().await;
        persisting.await.unwrap();

        let saved = SavedState::load(&pool, "moby.epub").await.unwrap();
        assert_eq!(saved.highlights, vec![highlight]);
        assert_eq!(
            saved.location.and_then(|l| l.fragment().map(str::to_string)).as_deref(),
            Some("epubcfi(/6/4!/4/200/1:0)")
        );
    }
}
