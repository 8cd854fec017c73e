//! Backend-agnostic reading position
//!
//! A [`Locator`] describes "where in the book" for both the script engine
//! (CFI fragments) and the native PDF view (page index). It serializes in a
//! Readium-like shape so it can be stored as-is and handed to the host UI:
//!
//! ```json
//! {
//!   "type": "book",
//!   "title": "Chapter 1",
//!   "locations": {
//!     "fragments": ["epubcfi(/6/4!/4/2/1:0)"],
//!     "progression": 0.25,
//!     "totalProgression": 0.03,
//!     "position": 1
//!   },
//!   "text": "Call me Ishmael.",
//!   "updatedAt": "2024-01-01T00:00:00Z"
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cfi;

/// Which backend a locator belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// Reflowable book rendered by the script engine
    #[default]
    Book,
    /// Native paginated PDF
    Pdf,
}

/// Position encodings of a locator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locations {
    /// Backend-specific encodings (CFI strings); empty for pure-page PDF positions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,
    /// Fraction within the current chapter (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression: Option<f64>,
    /// Fraction within the whole book (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
    /// Chapter/section index (PDF: page index)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// A position within a book
///
/// Equality compares every field. Callers that only care whether the
/// reading progress moved should use [`Locator::same_progress`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    #[serde(rename = "type")]
    pub kind: LocatorKind,
    /// Human-readable section label, derived from the TOC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub locations: Locations,
    /// Selected or highlighted text at this position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Locator {
    /// Empty locator for a reflowable book
    pub fn book() -> Self {
        Self::default()
    }

    /// Locator for a reflowable book at a CFI fragment
    pub fn from_fragment(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        let position = cfi::spine_index(&fragment);
        Self {
            kind: LocatorKind::Book,
            locations: Locations {
                fragments: vec![fragment],
                position,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Locator for a PDF page.
    ///
    /// `page_count` is used to derive the whole-document progression.
    pub fn pdf_page(page: u32, page_count: u32) -> Self {
        let total_progression = if page_count > 1 {
            Some(clamp_fraction(page as f64 / (page_count - 1) as f64))
        } else if page_count == 1 {
            Some(0.0)
        } else {
            None
        };

        Self {
            kind: LocatorKind::Pdf,
            locations: Locations {
                position: Some(page),
                total_progression,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Primary fragment, if any
    pub fn fragment(&self) -> Option<&str> {
        self.locations.fragments.first().map(String::as_str)
    }

    /// Replace the fragments with a single one
    pub fn set_fragment(&mut self, fragment: impl Into<String>) {
        self.locations.fragments = vec![fragment.into()];
    }

    pub fn position(&self) -> Option<u32> {
        self.locations.position
    }

    pub fn progression(&self) -> Option<f64> {
        self.locations.progression
    }

    pub fn total_progression(&self) -> Option<f64> {
        self.locations.total_progression
    }

    /// A locator can be turned back into a concrete location only when it
    /// carries a fragment or a position
    pub fn is_resolvable(&self) -> bool {
        !self.locations.fragments.is_empty() || self.locations.position.is_some()
    }

    /// Chapter index: explicit position first, then the fragment's spine index
    pub fn chapter_index(&self) -> Option<u32> {
        self.locations
            .position
            .or_else(|| self.fragment().and_then(cfi::spine_index))
    }

    /// Coarse comparison on (progression, total progression, updated_at).
    ///
    /// Two distinct positions can compare equal here; use `==` when the
    /// exact position matters.
    pub fn same_progress(&self, other: &Locator) -> bool {
        self.locations.progression == other.locations.progression
            && self.locations.total_progression == other.locations.total_progression
            && self.updated_at == other.updated_at
    }
}

/// Clamp a fraction into 0.0-1.0, mapping NaN to 0.0
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert an engine timestamp (epoch milliseconds) into a UTC datetime
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolvable() {
        assert!(!Locator::book().is_resolvable());
        assert!(Locator::from_fragment("epubcfi(/6/4!/2)").is_resolvable());
        assert!(Locator::pdf_page(0, 10).is_resolvable());
    }

    #[test]
    fn test_from_fragment_derives_chapter() {
        let locator = Locator::from_fragment("epubcfi(/6/8!/4/2)");
        assert_eq!(locator.chapter_index(), Some(3));
        assert_eq!(locator.fragment(), Some("epubcfi(/6/8!/4/2)"));
    }

    #[test]
    fn test_pdf_progression() {
        assert_eq!(Locator::pdf_page(0, 5).total_progression(), Some(0.0));
        assert_eq!(Locator::pdf_page(4, 5).total_progression(), Some(1.0));
        assert_eq!(Locator::pdf_page(2, 5).total_progression(), Some(0.5));
        assert_eq!(Locator::pdf_page(0, 0).total_progression(), None);
        assert!(Locator::pdf_page(3, 5).locations.fragments.is_empty());
    }

    #[test]
    fn test_full_equality_distinguishes_fragments() {
        let stamp = from_epoch_millis(1_700_000_000_000);
        let mut a = Locator::from_fragment("epubcfi(/6/4!/2)");
        a.locations.total_progression = Some(0.5);
        a.updated_at = stamp;
        let mut b = Locator::from_fragment("epubcfi(/6/6!/2)");
        b.locations.total_progression = Some(0.5);
        b.updated_at = stamp;

        assert!(a.same_progress(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_clamp_fraction() {
        assert_eq!(clamp_fraction(-0.5), 0.0);
        assert_eq!(clamp_fraction(1.5), 1.0);
        assert_eq!(clamp_fraction(f64::NAN), 0.0);
        assert_eq!(clamp_fraction(0.25), 0.25);
    }

    #[test]
    fn test_json_shape() {
        let locator = Locator::from_fragment("epubcfi(/6/4!/2)")
            .with_title("Chapter 1")
            .with_text("Call me Ishmael.");
        let json = serde_json::to_value(&locator).unwrap();

        assert_eq!(json["type"], "book");
        assert_eq!(json["title"], "Chapter 1");
        assert_eq!(json["locations"]["fragments"][0], "epubcfi(/6/4!/2)");
        assert_eq!(json["locations"]["position"], 1);
        assert!(json["locations"].get("totalProgression").is_none());

        let back: Locator = serde_json::from_value(json).unwrap();
        assert_eq!(back, locator);
    }
}
