//! User highlights
//!
//! A highlight is created from the current selection, drawn by the
//! rendering backend and mirrored into a [`HighlightStore`] keyed both by
//! id and by normalized fragment (for tap -> highlight lookups).

mod store;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cfi;
use crate::engine::PdfTarget;
use crate::locator::Locator;

pub use store::HighlightStore;

/// Highlight style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Underline,
    Strikethrough,
}

/// How the engine should draw a highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub color: &'static str,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 6] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Underline,
        HighlightColor::Strikethrough,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Underline => "underline",
            HighlightColor::Strikethrough => "strikethrough",
        }
    }

    /// Descriptor passed to `makeHighlightCFI` / `setAnnotations`
    pub fn descriptor(&self) -> ColorDescriptor {
        let (kind, color) = match self {
            HighlightColor::Yellow => ("highlight", "#FFEB3B"),
            HighlightColor::Green => ("highlight", "#A5D6A7"),
            HighlightColor::Blue => ("highlight", "#90CAF9"),
            HighlightColor::Pink => ("highlight", "#F48FB1"),
            HighlightColor::Underline => ("underline", "#E53935"),
            HighlightColor::Strikethrough => ("strikethrough", "#E53935"),
        };
        ColorDescriptor { kind, color }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        HighlightColor::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| format!("unknown highlight color: {}", s))
    }
}

/// A user highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: Uuid,
    /// Position at creation: fragment, chapter index and excerpt
    pub locator: Locator,
    pub color: HighlightColor,
    /// Section index the engine drew the highlight in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_index: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Highlight {
    /// Create a highlight with a fresh id
    pub fn new(locator: Locator, color: HighlightColor) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine_index: locator.chapter_index(),
            locator,
            color,
            created_at: Utc::now(),
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        self.locator.fragment()
    }

    /// Key used by the reverse fragment map
    pub fn fragment_key(&self) -> Option<String> {
        self.fragment().map(cfi::normalize)
    }

    pub fn text(&self) -> Option<&str> {
        self.locator.text.as_deref()
    }

    /// Reading order by fragment; highlights without one sort last
    pub fn reading_cmp(&self, other: &Self) -> Ordering {
        compare_fragments(
            self.fragment().unwrap_or_default(),
            other.fragment().unwrap_or_default(),
        )
    }
}

/// Reading order of two fragments. Two PDF page targets compare by page
/// and then by position on the page; anything else uses CFI order.
pub fn compare_fragments(a: &str, b: &str) -> Ordering {
    match (PdfTarget::parse(a), PdfTarget::parse(b)) {
        (Some(a), Some(b)) => a.reading_cmp(&b),
        _ => cfi::compare(a, b),
    }
}
