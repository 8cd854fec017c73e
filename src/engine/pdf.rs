//! Native PDF backend
//!
//! PDFs are shown by a platform PDF view instead of the script engine.
//! The host wraps that view in a [`PdfView`]; positions are page indices
//! and highlight fragments use the open-parameters style
//! `#page=<n>&rect=<x>,<y>,<w>,<h>`.

use std::cmp::Ordering;

use async_trait::async_trait;

use super::error::{EngineError, Result};
use super::theme::{Flow, Theme};
use super::traits::Backend;
use super::types::{EngineAnnotation, EngineHighlight, InitialPosition, Rect, RenderRequest};
use crate::highlight::{Highlight, HighlightColor};
use crate::locator::LocatorKind;
use crate::toc::{parse_page_href, PdfOutlineNode, TocLink};

/// A page, optionally narrowed to a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfTarget {
    pub page: u32,
    pub rect: Option<Rect>,
}

impl PdfTarget {
    pub fn page(page: u32) -> Self {
        Self { page, rect: None }
    }

    pub fn region(page: u32, rect: Rect) -> Self {
        Self {
            page,
            rect: Some(rect),
        }
    }

    /// Parse `#page=3&rect=1,2,3,4`, `page=3` or `page:3`
    pub fn parse(fragment: &str) -> Option<Self> {
        let fragment = fragment.trim();
        if let Some(page) = parse_page_href(fragment) {
            return Some(Self::page(page));
        }

        let mut page = None;
        let mut rect = None;
        for param in fragment.trim_start_matches('#').split('&') {
            let (key, value) = param.split_once('=')?;
            match key {
                "page" => page = Some(value.parse().ok()?),
                "rect" => {
                    let parts = value
                        .split(',')
                        .map(|p| p.trim().parse::<f64>().ok())
                        .collect::<Option<Vec<_>>>()?;
                    let [x, y, width, height] = parts.as_slice() else {
                        return None;
                    };
                    rect = Some(Rect {
                        x: *x,
                        y: *y,
                        width: *width,
                        height: *height,
                    });
                }
                _ => {}
            }
        }

        Some(Self { page: page?, rect })
    }

    /// Page first, then top to bottom and left to right within the page.
    /// A whole-page target comes before any region of the same page.
    pub fn reading_cmp(&self, other: &Self) -> Ordering {
        self.page.cmp(&other.page).then_with(|| match (&self.rect, &other.rect) {
            (Some(a), Some(b)) => a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x)),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    }

    pub fn to_fragment(&self) -> String {
        match self.rect {
            Some(r) => format!(
                "#page={}&rect={},{},{},{}",
                self.page, r.x, r.y, r.width, r.height
            ),
            None => format!("#page={}", self.page),
        }
    }
}

/// Display settings a PDF view understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfAppearance {
    pub background: String,
    /// Continuous vertical scrolling instead of single pages
    pub continuous: bool,
}

impl From<&Theme> for PdfAppearance {
    fn from(theme: &Theme) -> Self {
        Self {
            background: theme.style.theme.bg.clone(),
            continuous: theme.layout.flow == Flow::Scrolled,
        }
    }
}

/// Host-side wrapper around the platform PDF view
pub trait PdfView: Send + Sync {
    /// Open the document at `url`
    fn load(&self, url: &str) -> Result<()>;

    fn page_count(&self) -> u32;

    /// Index of the page currently shown
    fn current_page(&self) -> u32;

    fn go_to_page(&self, page: u32) -> Result<()>;

    /// Document outline, `None` when the PDF has none
    fn outline(&self) -> Option<Vec<PdfOutlineNode>>;

    fn set_appearance(&self, appearance: &PdfAppearance) -> Result<()>;

    fn add_highlight(&self, target: &PdfTarget, color: HighlightColor) -> Result<()>;

    fn remove_highlight(&self, target: &PdfTarget) -> Result<()>;

    fn has_selection(&self) -> bool;
}

/// Backend over a native [`PdfView`]
pub struct PdfBackend<V> {
    view: V,
}

impl<V: PdfView> PdfBackend<V> {
    pub fn new(view: V) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    fn draw_annotation(&self, annotation: &EngineAnnotation) -> Result<()> {
        let target = Self::target(&annotation.value)?;
        self.check_page(target.page)?;
        let color = annotation
            .color
            .as_ref()
            .and_then(|descriptor| {
                HighlightColor::ALL
                    .into_iter()
                    .find(|c| c.descriptor() == *descriptor)
            })
            .unwrap_or_default();
        self.view.add_highlight(&target, color)
    }

    fn target(fragment: &str) -> Result<PdfTarget> {
        PdfTarget::parse(fragment).ok_or_else(|| EngineError::InvalidTarget(fragment.to_string()))
    }

    fn check_page(&self, page: u32) -> Result<()> {
        let count = self.view.page_count();
        if count == 0 {
            return Err(EngineError::NotLoaded);
        }
        if page >= count {
            return Err(EngineError::InvalidTarget(format!(
                "page {} out of range (document has {} pages)",
                page, count
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<V: PdfView> Backend for PdfBackend<V> {
    fn kind(&self) -> LocatorKind {
        LocatorKind::Pdf
    }

    fn requires_handshake(&self) -> bool {
        false
    }

    async fn render(&self, request: &RenderRequest) -> Result<()> {
        self.view.load(&request.url)?;

        let page = match &request.initial {
            Some(InitialPosition::Fragment(fragment)) => Some(Self::target(fragment)?.page),
            Some(InitialPosition::Progression(fraction)) => {
                let last = self.view.page_count().saturating_sub(1);
                Some((fraction.clamp(0.0, 1.0) * last as f64).round() as u32)
            }
            None => None,
        };

        if let Some(page) = page {
            self.check_page(page)?;
            self.view.go_to_page(page)?;
        }
        Ok(())
    }

    async fn go_to(&self, target: &str) -> Result<()> {
        let target = Self::target(target)?;
        self.check_page(target.page)?;
        self.view.go_to_page(target.page)
    }

    async fn table_of_contents(&self) -> Result<Vec<TocLink>> {
        Ok(self
            .view
            .outline()
            .unwrap_or_default()
            .iter()
            .map(TocLink::from)
            .collect())
    }

    async fn set_theme(&self, theme: &Theme) -> Result<()> {
        self.view.set_appearance(&PdfAppearance::from(theme))
    }

    async fn create_highlight(
        &self,
        fragment: &str,
        color: HighlightColor,
    ) -> Result<EngineHighlight> {
        let target = Self::target(fragment)?;
        self.check_page(target.page)?;
        self.view.add_highlight(&target, color)?;

        Ok(EngineHighlight {
            index: target.page,
            label: None,
            cfi: target.to_fragment(),
            text: None,
        })
    }

    async fn remove_highlight(&self, highlight: &Highlight) -> Result<()> {
        let fragment = highlight.fragment().ok_or_else(|| {
            EngineError::InvalidTarget(format!("highlight {} has no fragment", highlight.id))
        })?;
        self.view.remove_highlight(&Self::target(fragment)?)
    }

    /// Draw every annotation that resolves to a page. Bad entries are
    /// logged and skipped; the error reports how many were skipped.
    async fn set_annotations(&self, annotations: &[EngineAnnotation]) -> Result<()> {
        let mut failed = 0;
        for annotation in annotations {
            if let Err(e) = self.draw_annotation(annotation) {
                tracing::warn!(fragment = %annotation.value, "Skipping annotation: {}", e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(EngineError::Pdf(format!(
                "{} of {} annotations could not be drawn",
                failed,
                annotations.len()
            )));
        }
        Ok(())
    }

    async fn has_selection(&self) -> Result<bool> {
        Ok(self.view.has_selection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakePdfView;
    use crate::locator::Locator;

    #[test]
    fn test_target_parse_forms() {
        assert_eq!(PdfTarget::parse("page:4"), Some(PdfTarget::page(4)));
        assert_eq!(PdfTarget::parse("#page=2"), Some(PdfTarget::page(2)));
        assert_eq!(
            PdfTarget::parse("#page=2&rect=10,20,30.5,40"),
            Some(PdfTarget::region(
                2,
                Rect {
                    x: 10.0,
                    y: 20.0,
                    width: 30.5,
                    height: 40.0
                }
            ))
        );
        assert_eq!(PdfTarget::parse("#rect=1,2,3,4"), None);
        assert_eq!(PdfTarget::parse("#page=2&rect=1,2"), None);
        assert_eq!(PdfTarget::parse("epubcfi(/6/4!/2)"), None);
    }

    #[test]
    fn test_target_fragment_round_trip() {
        let target = PdfTarget::region(
            5,
            Rect {
                x: 1.5,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            },
        );
        assert_eq!(target.to_fragment(), "#page=5&rect=1.5,2,3,4");
        assert_eq!(PdfTarget::parse(&target.to_fragment()), Some(target));
    }

    #[tokio::test]
    async fn test_render_opens_at_saved_page() {
        let backend = PdfBackend::new(FakePdfView::new(30));
        backend
            .render(&RenderRequest {
                url: "http://127.0.0.1:1/book/a.pdf".to_string(),
                initial: InitialPosition::from_locator(&Locator::pdf_page(12, 30)),
                extension_hint: Some("pdf".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(backend.view().current_page(), 12);
        assert_eq!(backend.view().loaded_url().as_deref(), Some("http://127.0.0.1:1/book/a.pdf"));
    }

    #[tokio::test]
    async fn test_go_to_out_of_range() {
        let backend = PdfBackend::new(FakePdfView::new(3));
        assert!(matches!(backend.go_to("page:3").await, Err(EngineError::InvalidTarget(_))));
        backend.go_to("page:2").await.unwrap();
        assert_eq!(backend.view().current_page(), 2);
    }

    #[tokio::test]
    async fn test_toc_from_outline() {
        let view = FakePdfView::new(40).with_outline(vec![PdfOutlineNode {
            title: "Intro".to_string(),
            page: Some(0),
            children: vec![],
        }]);
        let backend = PdfBackend::new(view);
        let toc = backend.table_of_contents().await.unwrap();
        assert_eq!(toc[0].page, Some(0));

        let empty = PdfBackend::new(FakePdfView::new(1));
        assert!(empty.table_of_contents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_highlight_round_trip_on_view() {
        let backend = PdfBackend::new(FakePdfView::new(10));
        let drawn = backend
            .create_highlight("#page=3&rect=1,1,5,5", HighlightColor::Green)
            .await
            .unwrap();
        assert_eq!(drawn.index, 3);
        assert_eq!(backend.view().highlight_count(), 1);

        let highlight = Highlight::new(Locator::book(), HighlightColor::Green);
        assert!(backend.remove_highlight(&highlight).await.is_err());

        let mut locator = Locator::pdf_page(3, 10);
        locator.set_fragment(drawn.cfi);
        backend
            .remove_highlight(&Highlight::new(locator, HighlightColor::Green))
            .await
            .unwrap();
        assert_eq!(backend.view().highlight_count(), 0);
    }

    #[tokio::test]
    async fn test_annotations_skip_bad_entries() {
        let backend = PdfBackend::new(FakePdfView::new(10));
        let annotations: Vec<EngineAnnotation> = ["#bogus", "#page=3&rect=1,2,3,4", "page:40"]
            .into_iter()
            .map(|value| EngineAnnotation {
                index: 0,
                value: value.to_string(),
                color: Some(HighlightColor::Green.descriptor()),
            })
            .collect();

        let result = backend.set_annotations(&annotations).await;

        assert!(matches!(result, Err(EngineError::Pdf(message)) if message.starts_with("2 of 3")));
        assert_eq!(backend.view().highlight_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_is_not_loaded() {
        let backend = PdfBackend::new(FakePdfView::new(0));
        assert!(matches!(backend.go_to("page:0").await, Err(EngineError::NotLoaded)));
        assert!(matches!(
            backend.create_highlight("#page=0", HighlightColor::Yellow).await,
            Err(EngineError::NotLoaded)
        ));
    }
}
