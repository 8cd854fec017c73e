//! In-memory highlight maps for one reader session

use std::collections::HashMap;

use uuid::Uuid;

use super::Highlight;
use crate::cfi;

/// Highlights indexed by id and by normalized fragment
#[derive(Debug, Default)]
pub struct HighlightStore {
    by_id: HashMap<Uuid, Highlight>,
    by_fragment: HashMap<String, Uuid>,
    selected: Option<Uuid>,
}

impl HighlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted highlights
    pub fn from_highlights(highlights: impl IntoIterator<Item = Highlight>) -> Self {
        let mut store = Self::new();
        for highlight in highlights {
            store.insert(highlight);
        }
        store
    }

    /// Insert (or replace) a highlight. Returns the previous value for the id.
    pub fn insert(&mut self, highlight: Highlight) -> Option<Highlight> {
        let previous = self.remove_entry(&highlight.id);
        if let Some(key) = highlight.fragment_key() {
            self.by_fragment.insert(key, highlight.id);
        }
        self.by_id.insert(highlight.id, highlight);
        previous
    }

    /// Remove a highlight. Removing an unknown id returns `None`.
    pub fn remove(&mut self, id: &Uuid) -> Option<Highlight> {
        let removed = self.remove_entry(id);
        if removed.is_some() && self.selected == Some(*id) {
            self.selected = None;
        }
        removed
    }

    fn remove_entry(&mut self, id: &Uuid) -> Option<Highlight> {
        let removed = self.by_id.remove(id)?;
        if let Some(key) = removed.fragment_key() {
            // another highlight may have taken over this fragment
            if self.by_fragment.get(&key) == Some(id) {
                self.by_fragment.remove(&key);
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Highlight> {
        self.by_id.get(id)
    }

    /// Reverse lookup from a fragment reported by the engine
    pub fn find_by_fragment(&self, fragment: &str) -> Option<&Highlight> {
        self.by_fragment
            .get(&cfi::normalize(fragment))
            .and_then(|id| self.by_id.get(id))
    }

    /// Mark a highlight as selected; unknown ids are ignored
    pub fn select(&mut self, id: Uuid) -> bool {
        if self.by_id.contains_key(&id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Highlight> {
        self.selected.and_then(|id| self.by_id.get(&id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of entries in the fragment map
    pub fn fragment_count(&self) -> usize {
        self.by_fragment.len()
    }

    /// Highlights in reading order
    pub fn ordered(&self) -> Vec<&Highlight> {
        let mut highlights: Vec<&Highlight> = self.by_id.values().collect();
        highlights.sort_by(|a, b| a.reading_cmp(b).then_with(|| a.created_at.cmp(&b.created_at)));
        highlights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightColor;
    use crate::locator::Locator;

    fn highlight(cfi: &str) -> Highlight {
        Highlight::new(Locator::from_fragment(cfi), HighlightColor::Yellow)
    }

    #[test]
    fn test_insert_and_reverse_lookup() {
        let mut store = HighlightStore::new();
        let h = highlight("epubcfi(/6/4!/4/2,/1:0,/1:5)");
        let id = h.id;
        store.insert(h);

        assert_eq!(store.len(), 1);
        assert_eq!(store.fragment_count(), 1);
        // lookup tolerates a missing wrapper and whitespace
        assert_eq!(store.find_by_fragment(" /6/4!/4/2,/1:0,/1:5").map(|h| h.id), Some(id));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = HighlightStore::new();
        let h = highlight("epubcfi(/6/4!/4/2)");
        let id = h.id;
        store.insert(h);

        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
        assert_eq!(store.fragment_count(), 0);
    }

    #[test]
    fn test_removing_shadowed_highlight_keeps_new_mapping() {
        let mut store = HighlightStore::new();
        let old = highlight("epubcfi(/6/4!/4/2)");
        let new = highlight("epubcfi(/6/4!/4/2)");
        let (old_id, new_id) = (old.id, new.id);
        store.insert(old);
        store.insert(new);

        store.remove(&old_id);
        assert_eq!(store.find_by_fragment("epubcfi(/6/4!/4/2)").map(|h| h.id), Some(new_id));
    }

    #[test]
    fn test_selection_cleared_on_remove() {
        let mut store = HighlightStore::new();
        let h = highlight("epubcfi(/6/4!/4/2)");
        let id = h.id;
        store.insert(h);

        assert!(store.select(id));
        assert_eq!(store.selected().map(|h| h.id), Some(id));
        store.remove(&id);
        assert!(store.selected().is_none());
        assert!(!store.select(id));
    }

    #[test]
    fn test_ordered_by_reading_position() {
        let store = HighlightStore::from_highlights(vec![
            highlight("epubcfi(/6/8!/4/2)"),
            highlight("epubcfi(/6/4!/4/2)"),
            highlight("epubcfi(/6/6!/4/2)"),
        ]);
        let ordered = store.ordered();
        let order: Vec<&str> = ordered.iter().filter_map(|h| h.fragment()).collect();
        assert_eq!(
            order,
            vec!["epubcfi(/6/4!/4/2)", "epubcfi(/6/6!/4/2)", "epubcfi(/6/8!/4/2)"]
        );
    }

    #[test]
    fn test_pdf_highlights_ordered_by_page() {
        let store = HighlightStore::from_highlights(vec![
            highlight("#page=10&rect=1,1,5,5"),
            highlight("#page=2&rect=1,1,5,5"),
        ]);
        let ordered = store.ordered();
        let order: Vec<&str> = ordered.iter().filter_map(|h| h.fragment()).collect();
        assert_eq!(order, vec!["#page=2&rect=1,1,5,5", "#page=10&rect=1,1,5,5"]);
    }
}
