//! Reading progress database operations

use chrono::Utc;
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::error::{AppError, Result};
use crate::locator::Locator;

/// Reading progress record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgressRecord {
    pub book_id: String,
    pub locator_json: String,
    pub progression: Option<f64>,
    pub total_progression: Option<f64>,
    pub cfi: Option<String>,
    pub position: Option<i64>,
    pub updated_at: String,
}

impl ProgressRecord {
    /// Decode the stored locator
    pub fn locator(&self) -> Result<Locator> {
        serde_json::from_str(&self.locator_json).map_err(|e| {
            AppError::InvalidRecord(format!("progress for {}: {}", self.book_id, e))
        })
    }
}

/// Progress repository
pub struct ProgressRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProgressRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get progress for a specific book
    pub async fn get(&self, book_id: &str) -> Result<Option<ProgressRecord>> {
        let progress = sqlx::query_as::<_, ProgressRecord>(
            r#"
            SELECT book_id, locator_json, progression, total_progression,
                   cfi, position, updated_at
            FROM reading_progress
            WHERE book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(progress)
    }

    /// Saved locator for a book, if any
    pub async fn load(&self, book_id: &str) -> Result<Option<Locator>> {
        self.get(book_id)
            .await?
            .map(|record| record.locator())
            .transpose()
    }

    /// Store the locator for a book.
    ///
    /// A locator older than the stored one leaves the row untouched.
    pub async fn upsert(&self, book_id: &str, locator: &Locator) -> Result<ProgressRecord> {
        let updated_at = format_timestamp(&locator.updated_at.unwrap_or_else(Utc::now));
        let locator_json = serde_json::to_string(locator)?;

        sqlx::query(
            r#"
            INSERT INTO reading_progress
                (book_id, locator_json, progression, total_progression, cfi, position, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_id) DO UPDATE SET
                locator_json = excluded.locator_json,
                progression = excluded.progression,
                total_progression = excluded.total_progression,
                cfi = excluded.cfi,
                position = excluded.position,
                updated_at = excluded.updated_at
            WHERE excluded.updated_at >= reading_progress.updated_at
            "#,
        )
        .bind(book_id)
        .bind(&locator_json)
        .bind(locator.progression())
        .bind(locator.total_progression())
        .bind(locator.fragment())
        .bind(locator.position().map(i64::from))
        .bind(&updated_at)
        .execute(self.pool)
        .await?;

        // Fetch the stored record
        self.get(book_id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch upserted progress".to_string()))
    }

    /// Delete progress for a book
    pub async fn delete(&self, book_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reading_progress WHERE book_id = ?")
            .bind(book_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::locator::from_epoch_millis;

    fn locator(cfi: &str, fraction: f64, millis: i64) -> Locator {
        let mut locator = Locator::from_fragment(cfi).with_title("Chapter 2");
        locator.locations.total_progression = Some(fraction);
        locator.updated_at = from_epoch_millis(millis);
        locator
    }

    #[tokio::test]
    async fn test_upsert_and_load() {
        let pool = test_pool().await;
        let repo = ProgressRepository::new(&pool);

        assert!(repo.load("moby").await.unwrap().is_none());

        let saved = locator("epubcfi(/6/4!/4/2/1:0)", 0.25, 1_700_000_000_000);
        let record = repo.upsert("moby", &saved).await.unwrap();
        assert_eq!(record.cfi.as_deref(), Some("epubcfi(/6/4!/4/2/1:0)"));
        assert_eq!(record.position, Some(1));
        assert_eq!(record.total_progression, Some(0.25));

        assert_eq!(repo.load("moby").await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_newer_replaces_older() {
        let pool = test_pool().await;
        let repo = ProgressRepository::new(&pool);

        repo.upsert("moby", &locator("epubcfi(/6/4!/2)", 0.1, 1_700_000_000_000))
            .await
            .unwrap();
        let newer = locator("epubcfi(/6/8!/2)", 0.4, 1_700_000_060_000);
        repo.upsert("moby", &newer).await.unwrap();

        assert_eq!(repo.load("moby").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_stale_update_ignored() {
        let pool = test_pool().await;
        let repo = ProgressRepository::new(&pool);

        let current = locator("epubcfi(/6/8!/2)", 0.4, 1_700_000_060_000);
        repo.upsert("moby", &current).await.unwrap();
        let record = repo
            .upsert("moby", &locator("epubcfi(/6/4!/2)", 0.1, 1_700_000_000_000))
            .await
            .unwrap();

        assert_eq!(record.cfi.as_deref(), Some("epubcfi(/6/8!/2)"));
        assert_eq!(repo.load("moby").await.unwrap(), Some(current));
    }

    #[tokio::test]
    async fn test_pdf_progress_and_delete() {
        let pool = test_pool().await;
        let repo = ProgressRepository::new(&pool);

        let page = Locator::pdf_page(9, 11);
        let record = repo.upsert("manual", &page).await.unwrap();
        assert_eq!(record.cfi, None);
        assert_eq!(record.position, Some(9));
        assert_eq!(record.total_progression, Some(0.9));

        assert!(repo.delete("manual").await.unwrap());
        assert!(!repo.delete("manual").await.unwrap());
        assert!(repo.get("manual").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_locator_is_reported() {
        let pool = test_pool().await;
        sqlx::query(
            r#"
            INSERT INTO reading_progress (book_id, locator_json, updated_at)
            VALUES ('moby', '{', '2024-01-01T00:00:00Z')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let repo = ProgressRepository::new(&pool);
        assert!(matches!(
            repo.load("moby").await,
            Err(AppError::InvalidRecord(_))
        ));
    }
}
