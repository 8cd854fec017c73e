//! Table of contents
//!
//! Both backends produce a nested outline: the script engine returns
//! `book.toc` as JSON (`{label, href, subitems}`), the PDF view exposes a
//! native outline tree (`{title, page, children}`). Both are converted into
//! [`TocLink`] trees and flattened on demand for display and lookups.

mod lookup;

use serde::{Deserialize, Serialize};

pub use lookup::{nearest_preceding, TocLabelHolder};

/// One entry of the table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocLink {
    /// Navigation target (CFI/href for books, `page:<n>` for PDFs)
    pub href: String,
    pub title: String,
    /// Page index for PDF outline entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocLink>,
}

/// A flattened entry: nesting depth plus the link it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatTocItem<'a> {
    pub depth: usize,
    pub link: &'a TocLink,
}

impl TocLink {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: title.into(),
            page: None,
            children: Vec::new(),
        }
    }

    /// Link to a PDF page
    pub fn page(title: impl Into<String>, page: u32) -> Self {
        Self {
            href: page_href(page),
            title: title.into(),
            page: Some(page),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TocLink>) -> Self {
        self.children = children;
        self
    }
}

/// Navigation target for a PDF page
pub fn page_href(page: u32) -> String {
    format!("page:{}", page)
}

/// Parse a `page:<n>` navigation target
pub fn parse_page_href(href: &str) -> Option<u32> {
    href.strip_prefix("page:")?.parse().ok()
}

/// Depth-first, pre-order flattening. Roots are at depth 0.
pub fn flatten(links: &[TocLink]) -> Vec<FlatTocItem<'_>> {
    let mut out = Vec::new();
    flatten_into(links, 0, &mut out);
    out
}

fn flatten_into<'a>(links: &'a [TocLink], depth: usize, out: &mut Vec<FlatTocItem<'a>>) {
    for link in links {
        out.push(FlatTocItem { depth, link });
        flatten_into(&link.children, depth + 1, out);
    }
}

/// TOC item as serialized by the script engine's `book.toc`
#[derive(Debug, Clone, Deserialize)]
pub struct EngineTocItem {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub subitems: Option<Vec<EngineTocItem>>,
}

impl From<EngineTocItem> for TocLink {
    fn from(item: EngineTocItem) -> Self {
        TocLink {
            href: item.href,
            title: item.label.trim().to_string(),
            page: None,
            children: item
                .subitems
                .unwrap_or_default()
                .into_iter()
                .map(TocLink::from)
                .collect(),
        }
    }
}

/// Node of a native PDF outline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfOutlineNode {
    pub title: String,
    /// Destination page index, if the entry has one
    pub page: Option<u32>,
    pub children: Vec<PdfOutlineNode>,
}

impl From<&PdfOutlineNode> for TocLink {
    fn from(node: &PdfOutlineNode) -> Self {
        let title = if node.title.trim().is_empty() {
            node.page
                .map(|p| format!("Page {}", p + 1))
                .unwrap_or_default()
        } else {
            node.title.trim().to_string()
        };

        TocLink {
            href: node.page.map(page_href).unwrap_or_default(),
            title,
            page: node.page,
            children: node.children.iter().map(TocLink::from).collect(),
        }
    }
}
