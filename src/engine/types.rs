//! Values exchanged with rendering backends

use serde::{Deserialize, Serialize};

use crate::highlight::{ColorDescriptor, Highlight};
use crate::locator::Locator;

/// Rectangle in view coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }
}

/// Where to open the book
#[derive(Debug, Clone, PartialEq)]
pub enum InitialPosition {
    /// A backend fragment (CFI, or `page:<n>` for PDFs)
    Fragment(String),
    /// Whole-book progression (0.0-1.0)
    Progression(f64),
}

impl InitialPosition {
    /// Starting position for a saved locator: its fragment when it has
    /// one, otherwise the page for PDFs, otherwise its total progression
    pub fn from_locator(locator: &Locator) -> Option<Self> {
        if let Some(fragment) = locator.fragment() {
            return Some(InitialPosition::Fragment(fragment.to_string()));
        }
        if locator.kind == crate::locator::LocatorKind::Pdf {
            if let Some(page) = locator.position() {
                return Some(InitialPosition::Fragment(crate::toc::page_href(page)));
            }
        }
        locator.total_progression().map(InitialPosition::Progression)
    }
}

/// Arguments of the "render book" call
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// URL the book content is served at
    pub url: String,
    pub initial: Option<InitialPosition>,
    /// File extension hint (`epub`, `mobi`, `fb2`, ...)
    pub extension_hint: Option<String>,
}

/// Result of `makeHighlightCFI`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineHighlight {
    /// Section index the highlight was drawn in
    pub index: u32,
    #[serde(default)]
    pub label: Option<String>,
    pub cfi: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Entry of `setAnnotations` / argument of `removeAnnotation`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineAnnotation {
    pub index: u32,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorDescriptor>,
}

impl EngineAnnotation {
    /// Annotation for bulk injection; highlights without a fragment have
    /// nothing to draw
    pub fn from_highlight(highlight: &Highlight) -> Option<Self> {
        Some(Self {
            index: highlight.engine_index.unwrap_or_default(),
            value: highlight.fragment()?.to_string(),
            color: Some(highlight.color.descriptor()),
        })
    }

    /// Reference used to undraw a highlight
    pub fn reference(highlight: &Highlight) -> Option<Self> {
        Self::from_highlight(highlight).map(|mut annotation| {
            annotation.color = None;
            annotation
        })
    }
}
