//! Highlights database operations

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::error::{AppError, Result};
use crate::highlight::{Highlight, HighlightColor};

/// Highlight record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HighlightRecord {
    pub id: String,
    pub book_id: String,
    pub cfi: String,
    pub chapter_index: Option<i64>,
    pub color: String,
    pub text: Option<String>,
    pub locator_json: String,
    pub created_at: String,
}

impl TryFrom<HighlightRecord> for Highlight {
    type Error = AppError;

    fn try_from(record: HighlightRecord) -> Result<Self> {
        let invalid = |what: &str, detail: String| {
            AppError::InvalidRecord(format!("highlight {} {}: {}", record.id, what, detail))
        };

        let id = Uuid::parse_str(&record.id).map_err(|e| invalid("id", e.to_string()))?;
        let color = record
            .color
            .parse::<HighlightColor>()
            .map_err(|e| invalid("color", e))?;
        let locator = serde_json::from_str(&record.locator_json)
            .map_err(|e| invalid("locator", e.to_string()))?;
        let engine_index = record
            .chapter_index
            .map(u32::try_from)
            .transpose()
            .map_err(|e| invalid("chapter index", e.to_string()))?;

        Ok(Highlight {
            id,
            locator,
            color,
            engine_index,
            created_at: parse_timestamp(&record.created_at)?,
        })
    }
}

/// Highlight repository
pub struct HighlightRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HighlightRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a specific highlight
    pub async fn get(&self, id: &Uuid) -> Result<Option<Highlight>> {
        let record = sqlx::query_as::<_, HighlightRecord>(
            r#"
            SELECT id, book_id, cfi, chapter_index, color, text, locator_json, created_at
            FROM highlights
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        record.map(Highlight::try_from).transpose()
    }

    /// List highlights for a book in document order
    pub async fn list_for_book(&self, book_id: &str) -> Result<Vec<Highlight>> {
        let records = sqlx::query_as::<_, HighlightRecord>(
            r#"
            SELECT id, book_id, cfi, chapter_index, color, text, locator_json, created_at
            FROM highlights
            WHERE book_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(self.pool)
        .await?;

        let mut highlights = records
            .into_iter()
            .map(Highlight::try_from)
            .collect::<Result<Vec<_>>>()?;
        // stable sort keeps creation order for equal positions
        highlights.sort_by(Highlight::reading_cmp);

        Ok(highlights)
    }

    /// Insert a highlight, replacing any row with the same id
    pub async fn save(&self, book_id: &str, highlight: &Highlight) -> Result<()> {
        let cfi = highlight.fragment().ok_or_else(|| {
            AppError::BadRequest(format!("highlight {} has no position", highlight.id))
        })?;
        let locator_json = serde_json::to_string(&highlight.locator)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO highlights
                (id, book_id, cfi, chapter_index, color, text, locator_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(highlight.id.to_string())
        .bind(book_id)
        .bind(cfi)
        .bind(highlight.engine_index.map(i64::from))
        .bind(highlight.color.as_str())
        .bind(highlight.text())
        .bind(&locator_json)
        .bind(format_timestamp(&highlight.created_at))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a highlight
    pub async fn delete(&self, id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::locator::Locator;

    fn highlight(cfi: &str, color: HighlightColor) -> Highlight {
        Highlight::new(Locator::from_fragment(cfi).with_text("call me Ishmael"), color)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let saved = highlight("epubcfi(/6/4!/4/2,/1:0,/1:15)", HighlightColor::Pink);
        repo.save("moby", &saved).await.unwrap();

        let loaded = repo.get(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.engine_index, Some(1));
    }

    #[tokio::test]
    async fn test_list_in_document_order() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let late = highlight("epubcfi(/6/10!/4/2/1:3)", HighlightColor::Yellow);
        let early = highlight("epubcfi(/6/4!/4/2/1:3)", HighlightColor::Green);
        let middle = highlight("epubcfi(/6/4!/4/8/1:0)", HighlightColor::Blue);
        for h in [&late, &early, &middle] {
            repo.save("moby", h).await.unwrap();
        }
        repo.save("other", &highlight("epubcfi(/6/2!/2)", HighlightColor::Yellow))
            .await
            .unwrap();

        let listed: Vec<Uuid> = repo
            .list_for_book("moby")
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(listed, vec![early.id, middle.id, late.id]);
    }

    #[tokio::test]
    async fn test_list_pdf_highlights_by_page() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let tenth = highlight("#page=10&rect=0,0,5,5", HighlightColor::Yellow);
        let second = highlight("#page=2&rect=0,0,5,5", HighlightColor::Green);
        repo.save("manual", &tenth).await.unwrap();
        repo.save("manual", &second).await.unwrap();

        let listed: Vec<Uuid> = repo
            .list_for_book("manual")
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(listed, vec![second.id, tenth.id]);
    }

    #[tokio::test]
    async fn test_save_replaces_color() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let mut saved = highlight("epubcfi(/6/4!/4/2/1:3)", HighlightColor::Yellow);
        repo.save("moby", &saved).await.unwrap();
        saved.color = HighlightColor::Underline;
        repo.save("moby", &saved).await.unwrap();

        let listed = repo.list_for_book("moby").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].color, HighlightColor::Underline);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let saved = highlight("epubcfi(/6/4!/4/2/1:3)", HighlightColor::Yellow);
        repo.save("moby", &saved).await.unwrap();

        assert!(repo.delete(&saved.id).await.unwrap());
        assert!(!repo.delete(&saved.id).await.unwrap());
        assert!(repo.get(&saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_highlight_without_position_rejected() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let stray = Highlight::new(Locator::book(), HighlightColor::Yellow);
        assert!(matches!(
            repo.save("moby", &stray).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_color_is_invalid() {
        let pool = test_pool().await;
        let saved = highlight("epubcfi(/6/4!/4/2/1:3)", HighlightColor::Yellow);
        let repo = HighlightRepository::new(&pool);
        repo.save("moby", &saved).await.unwrap();

        sqlx::query("UPDATE highlights SET color = 'mauve'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            repo.list_for_book("moby").await,
            Err(AppError::InvalidRecord(_))
        ));
    }
}
