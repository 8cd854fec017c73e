//! Current-chapter lookup for paginated documents

use super::FlatTocItem;

/// Find the entry the given page belongs to.
///
/// Picks the last entry (in document order) whose page is at or before
/// `page`, so a page between two entries belongs to the earlier one and an
/// exact match belongs to the matching entry. The final entry takes part in
/// the search like any other. Entries without a page are skipped.
pub fn nearest_preceding<'a, 'b>(
    items: &'b [FlatTocItem<'a>],
    page: u32,
) -> Option<&'b FlatTocItem<'a>> {
    items
        .iter()
        .filter(|item| matches!(item.link.page, Some(p) if p <= page))
        .last()
}

/// Keeps the last resolved label so a position with no matching entry
/// still shows the previous section title instead of a blank one
#[derive(Debug, Clone, Default)]
pub struct TocLabelHolder {
    last: Option<String>,
}

impl TocLabelHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `found` if present, then return the label to display
    pub fn resolve(&mut self, found: Option<&str>) -> Option<&str> {
        if let Some(label) = found {
            self.last = Some(label.to_string());
        }
        self.last.as_deref()
    }

    /// Forget the last label, e.g. after the outline was reloaded
    pub fn reset(&mut self) {
        self.last = None;
    }
}
