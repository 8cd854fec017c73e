//! Ephemeral text selection

use serde::Serialize;

use crate::bridge::{HighlightTapPayload, SelectedTextPayload};
use crate::engine::Rect;

/// Height reserved for the context menu when placing it from geometry
pub const MENU_HEIGHT: f64 = 44.0;

/// Where the context menu goes relative to the selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionDirection {
    /// Menu above the selection
    Up,
    /// Menu below the selection
    #[default]
    Down,
}

impl SelectionDirection {
    /// Read the engine's `dir` hint
    pub fn from_hint(hint: &str) -> Self {
        if hint.trim().eq_ignore_ascii_case("up") {
            SelectionDirection::Up
        } else {
            SelectionDirection::Down
        }
    }

    /// Place a menu of `menu_height` above the selection when it fits,
    /// otherwise below it
    pub fn for_rect(rect: &Rect, menu_height: f64) -> Self {
        if rect.y >= menu_height {
            SelectionDirection::Up
        } else {
            SelectionDirection::Down
        }
    }

    /// The engine's hint when it sent one, otherwise placed from `rect`
    pub fn resolve(hint: Option<&str>, rect: &Rect) -> Self {
        match hint {
            Some(hint) => Self::from_hint(hint),
            None => Self::for_rect(rect, MENU_HEIGHT),
        }
    }
}

/// Snapshot of the current selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub rect: Rect,
    pub text: String,
    pub direction: SelectionDirection,
    /// Backend fragment of the selected range
    pub fragment: String,
    /// Section (or page) index
    pub index: Option<u32>,
}

impl Selection {
    /// A selection with no text or no fragment cannot be highlighted
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() || self.fragment.trim().is_empty()
    }
}

impl From<&SelectedTextPayload> for Selection {
    fn from(payload: &SelectedTextPayload) -> Self {
        let rect = Rect {
            x: payload.x,
            y: payload.y,
            width: payload.width,
            height: payload.height,
        };
        Selection {
            direction: SelectionDirection::resolve(payload.dir.as_deref(), &rect),
            rect,
            text: payload.text.clone(),
            fragment: payload.value.clone(),
            index: payload.index,
        }
    }
}

impl From<&HighlightTapPayload> for Selection {
    fn from(payload: &HighlightTapPayload) -> Self {
        let rect = Rect {
            x: payload.x,
            y: payload.y,
            width: payload.width,
            height: payload.height,
        };
        Selection {
            direction: SelectionDirection::resolve(payload.dir.as_deref(), &rect),
            rect,
            text: payload.text.clone().unwrap_or_default(),
            fragment: payload.value.clone(),
            index: payload.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_hint() {
        assert_eq!(SelectionDirection::from_hint("up"), SelectionDirection::Up);
        assert_eq!(SelectionDirection::from_hint(" UP "), SelectionDirection::Up);
        assert_eq!(SelectionDirection::from_hint("DOWN"), SelectionDirection::Down);
    }

    #[test]
    fn test_direction_without_hint_uses_rect() {
        let near_top = Rect { x: 0.0, y: 10.0, width: 50.0, height: 20.0 };
        let lower = Rect { x: 0.0, y: 300.0, width: 50.0, height: 20.0 };
        assert_eq!(SelectionDirection::resolve(None, &near_top), SelectionDirection::Down);
        assert_eq!(SelectionDirection::resolve(None, &lower), SelectionDirection::Up);
        assert_eq!(SelectionDirection::resolve(Some("down"), &lower), SelectionDirection::Down);
    }

    #[test]
    fn test_empty_selection() {
        let selection = Selection {
            rect: Rect::default(),
            text: "  ".to_string(),
            direction: SelectionDirection::Down,
            fragment: "epubcfi(/6/4!/2)".to_string(),
            index: None,
        };
        assert!(selection.is_empty());
    }
}
