//! Persists reader events as they are published

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use super::{HighlightRepository, ProgressRepository};
use crate::error::Result;
use crate::reader::ReaderEvent;

/// Write relocations and highlight changes for `book_id` until the feed
/// closes. Write failures are logged per event.
pub async fn persist_events(
    pool: SqlitePool,
    book_id: String,
    mut events: mpsc::UnboundedReceiver<ReaderEvent>,
) {
    let mut written = 0usize;
    while let Some(event) = events.recv().await {
        match persist_event(&pool, &book_id, &event).await {
            Ok(()) => written += 1,
            Err(e) => tracing::warn!(
                book_id = %book_id,
                event = event.name(),
                "Failed to persist event: {}",
                e
            ),
        }
    }
    tracing::debug!(book_id = %book_id, written, "event persistence stopped");
}

/// Apply a single event to the database
pub async fn persist_event(pool: &SqlitePool, book_id: &str, event: &ReaderEvent) -> Result<()> {
    match event {
        ReaderEvent::Relocated(locator) => {
            ProgressRepository::new(pool).upsert(book_id, locator).await?;
        }
        ReaderEvent::Highlighted(highlight) => {
            HighlightRepository::new(pool).save(book_id, highlight).await?;
        }
        ReaderEvent::Unhighlighted(highlight) => {
            HighlightRepository::new(pool).delete(&highlight.id).await?;
        }
        _ => {}
    }
    Ok(())
}
