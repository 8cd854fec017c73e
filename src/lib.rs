//! Libro Reader
//!
//! Reader core for an e-book application that drives an embedded
//! rendering engine. It reconciles reading positions and highlights
//! reported by the engine with the host's own state, flattens tables of
//! contents, serves the open book over loopback HTTP and persists
//! progress to SQLite.

pub mod bridge;
pub mod cfi;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod locator;
pub mod reader;
pub mod server;
pub mod session;
pub mod toc;

pub use config::Config;
pub use error::{AppError, Result};
pub use highlight::{Highlight, HighlightColor};
pub use locator::Locator;
pub use reader::{ReaderCore, ReaderEvent, ReaderOptions, ReaderPhase};
pub use session::{ReaderSession, SavedState};
