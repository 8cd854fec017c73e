//! Signals published by the reader core

use uuid::Uuid;

use super::selection::Selection;
use crate::bridge::Point;
use crate::highlight::Highlight;
use crate::locator::Locator;

/// Published on the reader's broadcast channel
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    Tap(Point),
    SelectionChanged {
        selection: Selection,
        locator: Locator,
        /// Set when an existing highlight was tapped
        highlight: Option<Uuid>,
    },
    SelectionCleared,
    Relocated(Locator),
    Highlighted(Highlight),
    Unhighlighted(Highlight),
    TocChanged,
}

impl ReaderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReaderEvent::Tap(_) => "tap",
            ReaderEvent::SelectionChanged { .. } => "selection_changed",
            ReaderEvent::SelectionCleared => "selection_cleared",
            ReaderEvent::Relocated(_) => "relocated",
            ReaderEvent::Highlighted(_) => "highlighted",
            ReaderEvent::Unhighlighted(_) => "unhighlighted",
            ReaderEvent::TocChanged => "toc_changed",
        }
    }

    /// Events that change stored reading state
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            ReaderEvent::Relocated(_) | ReaderEvent::Highlighted(_) | ReaderEvent::Unhighlighted(_)
        )
    }
}
