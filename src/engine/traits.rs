//! Backend capability trait
//!
//! The reader core is generic over the rendering backend. Each backend
//! provides the same capability set; calls are single awaited round trips
//! with no timeout.

use async_trait::async_trait;

use super::error::Result;
use super::theme::Theme;
use super::types::{EngineAnnotation, EngineHighlight, RenderRequest};
use crate::highlight::{Highlight, HighlightColor};
use crate::locator::LocatorKind;
use crate::toc::TocLink;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Kind of locators this backend produces
    fn kind(&self) -> LocatorKind;

    /// Whether the backend announces itself with `initiatedSwiftReader`
    /// before it can render. Native backends are ready immediately.
    fn requires_handshake(&self) -> bool {
        true
    }

    /// Load and display the book
    async fn render(&self, request: &RenderRequest) -> Result<()>;

    /// Navigate to a fragment or TOC href
    async fn go_to(&self, target: &str) -> Result<()>;

    /// Nested table of contents
    async fn table_of_contents(&self) -> Result<Vec<TocLink>>;

    /// Push appearance settings
    async fn set_theme(&self, theme: &Theme) -> Result<()>;

    /// Draw a highlight over `fragment`
    async fn create_highlight(&self, fragment: &str, color: HighlightColor)
        -> Result<EngineHighlight>;

    /// Undraw a highlight
    async fn remove_highlight(&self, highlight: &Highlight) -> Result<()>;

    /// Draw previously persisted highlights
    async fn set_annotations(&self, annotations: &[EngineAnnotation]) -> Result<()>;

    /// Whether the backend currently has a live text selection
    async fn has_selection(&self) -> Result<bool>;
}
