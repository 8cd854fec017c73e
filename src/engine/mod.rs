//! Rendering backends
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │  ReaderCore<Backend> │
//!                 └──────────┬───────────┘
//!            ┌───────────────┴───────────────┐
//!            ▼                               ▼
//!   ┌─────────────────┐             ┌─────────────────┐
//!   │  ScriptBackend  │             │   PdfBackend    │
//!   │ (globalReader)  │             │  (native view)  │
//!   └────────┬────────┘             └────────┬────────┘
//!            ▼                               ▼
//!     ScriptRuntime                       PdfView
//!   (host web view)                  (host PDF widget)
//! ```

mod error;
mod pdf;
mod script;
mod theme;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, Result};
pub use pdf::{PdfAppearance, PdfBackend, PdfTarget, PdfView};
pub use script::{reader_call, ScriptBackend, ScriptRuntime, READER_OBJECT};
pub use theme::{Flow, Theme, ThemeColors, ThemeLayout, ThemeName, ThemeStyle};
pub use traits::Backend;
pub use types::{EngineAnnotation, EngineHighlight, InitialPosition, Rect, RenderRequest};
