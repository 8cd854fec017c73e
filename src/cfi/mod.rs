//! CFI (Canonical Fragment Identifier) helpers
//!
//! The rendering engine reports positions, selections and highlights as
//! EPUB CFI strings. The reader core never resolves a CFI against a DOM;
//! it only needs to:
//!
//! - normalize fragments so the same position always maps to the same key
//!   in the highlight reverse map,
//! - extract the spine (chapter) index from a fragment,
//! - order fragments in reading order.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chap01]!/4/2,/1:0,/1:12)
//!         │  │        │ │   └──────── range start and end (relative)
//!         │  │        │ └──────────── path inside the content document
//!         │  │        └────────────── indirection
//!         │  └─────────────────────── spine item with ID assertion
//!         └────────────────────────── spine element
//! ```

mod parser;

use std::cmp::Ordering;
use std::fmt;

pub use parser::{parse, CfiError};

/// A parsed CFI, possibly a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfi {
    /// Common path (for ranges, the common ancestor)
    pub path: CfiPath,
    /// Optional range start/end relative to `path`
    pub range: Option<CfiRange>,
}

/// A sequence of steps with an optional trailing character offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfiPath {
    pub steps: Vec<CfiStep>,
    pub offset: Option<u32>,
}

/// Range part of a CFI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiRange {
    pub start: CfiPath,
    pub end: CfiPath,
}

/// One step of a CFI path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfiStep {
    /// `/N` with an optional `[id]` assertion
    Element { index: u32, id: Option<String> },
    /// `!`, stepping into the referenced content document
    Indirection,
}

impl CfiStep {
    /// Compare by position only, ignoring id assertions
    fn position_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CfiStep::Indirection, CfiStep::Indirection) => Ordering::Equal,
            (CfiStep::Element { index: a, .. }, CfiStep::Element { index: b, .. }) => a.cmp(b),
            (CfiStep::Indirection, CfiStep::Element { .. }) => Ordering::Less,
            (CfiStep::Element { .. }, CfiStep::Indirection) => Ordering::Greater,
        }
    }

    fn id(&self) -> Option<&str> {
        match self {
            CfiStep::Element { id, .. } => id.as_deref(),
            CfiStep::Indirection => None,
        }
    }
}

impl Cfi {
    /// Spine index referenced by this CFI (`/6/N` where N = 2 * (index + 1))
    pub fn spine_index(&self) -> Option<u32> {
        match self.path.steps.as_slice() {
            [CfiStep::Element { index: 6, .. }, CfiStep::Element { index, .. }, ..] => {
                Some((index / 2).saturating_sub(1))
            }
            _ => None,
        }
    }

    /// Start position as an absolute path (range start appended to the parent)
    fn start_path(&self) -> CfiPath {
        match &self.range {
            Some(range) => {
                let mut steps = self.path.steps.clone();
                steps.extend(range.start.steps.iter().cloned());
                CfiPath {
                    steps,
                    offset: range.start.offset,
                }
            }
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some(range) = &self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                CfiStep::Element { index, id: Some(id) } => write!(f, "/{}[{}]", index, id)?,
                CfiStep::Element { index, id: None } => write!(f, "/{}", index)?,
                CfiStep::Indirection => write!(f, "!")?,
            }
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        Ok(())
    }
}

/// Document order. Paths at the same position are further ordered by their
/// id assertions and by whether an offset is present, so `cmp` returns
/// `Equal` exactly when the paths are `==`.
impl Ord for CfiPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let position = self
            .steps
            .iter()
            .zip(other.steps.iter())
            .map(|(a, b)| a.position_cmp(b))
            .find(|cmp| cmp.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.steps.len().cmp(&other.steps.len()))
            .then_with(|| self.offset.unwrap_or(0).cmp(&other.offset.unwrap_or(0)));

        position
            .then_with(|| self.offset.is_some().cmp(&other.offset.is_some()))
            .then_with(|| {
                self.steps
                    .iter()
                    .map(CfiStep::id)
                    .cmp(other.steps.iter().map(CfiStep::id))
            })
    }
}

impl PartialOrd for CfiPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Normalize a fragment string for use as a lookup key.
///
/// Whitespace is removed, a missing `epubcfi(...)` wrapper is added and
/// side-bias/text assertions are dropped. Strings that do not parse as a
/// CFI (e.g. PDF fragments) are returned trimmed.
pub fn normalize(fragment: &str) -> String {
    let trimmed = fragment.trim();
    match parse(trimmed) {
        Ok(cfi) => cfi.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Spine index of a CFI string, if it parses
pub fn spine_index(fragment: &str) -> Option<u32> {
    parse(fragment).ok().and_then(|cfi| cfi.spine_index())
}

/// Compare two CFI strings in reading order.
///
/// Unparseable strings sort after parseable ones and fall back to
/// lexicographic order among themselves.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Ok(a), Ok(b)) => a.start_path().cmp(&b.start_path()),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
