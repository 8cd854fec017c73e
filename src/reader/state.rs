//! Reader lifecycle and interaction state

use serde::Serialize;

/// Publicly observed loading state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ReaderPhase {
    #[default]
    Loading,
    Ready,
    /// The book could not be opened; terminal for the session
    Failed(String),
}

impl ReaderPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReaderPhase::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ReaderPhase::Failed(_))
    }
}

/// Handshake flags gating the render call and the ready transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// The engine script finished loading in the web view
    pub script_loaded: bool,
    /// The engine posted `initiatedSwiftReader`
    pub engine_constructed: bool,
    /// `initBook` has been issued
    pub render_issued: bool,
    /// `initBook` resolved
    pub rendered: bool,
    /// The first theme push happened after rendering
    pub theme_applied: bool,
}

impl Readiness {
    /// Both halves of the handshake have been seen
    pub fn can_render(&self) -> bool {
        self.script_loaded && self.engine_constructed
    }

    pub fn can_finish(&self) -> bool {
        self.can_render() && self.rendered && self.theme_applied
    }
}

/// Highlight interaction state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HighlightPhase {
    /// Nothing selected
    #[default]
    Idle,
    /// Live text selection, no highlight yet
    Selecting,
    /// A highlight was just drawn
    Highlighted,
    /// The user tapped an existing highlight
    Editing,
}
