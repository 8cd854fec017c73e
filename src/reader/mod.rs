//! Reader core
//!
//! [`ReaderCore`] owns the reading state of one open book: the current
//! locator, the table of contents, the highlight maps and the selection.
//! It is generic over the rendering [`Backend`], so the script engine and
//! the native PDF view share one implementation.
//!
//! # Lifecycle
//!
//! ```text
//!  mark_script_loaded ──┐
//!                       ├─► initBook ─► setAnnotations ─► toc ─► setTheme ─► Ready
//!  initiatedSwiftReader ┘        │
//!                                └─(error)─► Failed
//! ```
//!
//! Engine callbacks are fed through [`ReaderCore::handle_message`], which
//! never fails: malformed payloads are logged, counted and dropped.
//! Changes are published on a broadcast channel ([`ReaderEvent`]) and the
//! loading state on a watch channel ([`ReaderPhase`]). Broadcast receivers
//! may lag and skip events; persistence reads from
//! [`ReaderCore::persistence_feed`] instead, which never drops any.

mod error;
mod events;
mod selection;
mod state;

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};

use crate::bridge::{
    BridgeError, BridgeStats, EngineMessage, HighlightTapPayload, RelocatePayload,
    SelectedTextPayload,
};
use crate::cfi;
use crate::config::ReaderConfig;
use crate::engine::{
    Backend, EngineAnnotation, EngineHighlight, InitialPosition, PdfBackend, PdfView,
    RenderRequest, Theme,
};
use crate::highlight::{Highlight, HighlightColor, HighlightStore};
use crate::locator::{clamp_fraction, from_epoch_millis, Locator, LocatorKind};
use crate::toc::{self, FlatTocItem, TocLabelHolder, TocLink};

pub use error::ReaderError;
pub use events::ReaderEvent;
pub use selection::{Selection, SelectionDirection};
pub use state::{HighlightPhase, ReaderPhase, Readiness};

const EVENT_CAPACITY: usize = 64;

/// Per-session reader settings
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    pub theme: Theme,
    /// Pause before flipping to `Ready`, hides the unstyled first paint
    pub ready_delay: Duration,
    /// File extension passed to the engine
    pub extension_hint: Option<String>,
}

impl ReaderOptions {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            theme: config.theme(),
            ready_delay: Duration::from_millis(config.ready_delay_ms),
            extension_hint: None,
        }
    }

    pub fn with_extension_hint(mut self, hint: impl Into<String>) -> Self {
        self.extension_hint = Some(hint.into());
        self
    }
}

/// TOC entry the current position belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTocItem {
    pub label: String,
    pub href: String,
}

/// Reading state of one open book
pub struct ReaderCore<B: Backend> {
    backend: B,
    book_url: String,
    options: ReaderOptions,
    readiness: Readiness,
    phase: watch::Sender<ReaderPhase>,
    events: broadcast::Sender<ReaderEvent>,
    persistence: Vec<mpsc::UnboundedSender<ReaderEvent>>,
    initial_location: Option<Locator>,
    current: Locator,
    current_toc_item: Option<CurrentTocItem>,
    toc: Vec<TocLink>,
    toc_unavailable: bool,
    label_holder: TocLabelHolder,
    highlights: HighlightStore,
    selection: Option<Selection>,
    highlight_phase: HighlightPhase,
    stats: BridgeStats,
}

impl<B: Backend> ReaderCore<B> {
    pub fn new(backend: B, book_url: impl Into<String>, options: ReaderOptions) -> Self {
        let (phase, _) = watch::channel(ReaderPhase::Loading);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let current = Locator {
            kind: backend.kind(),
            ..Default::default()
        };

        Self {
            backend,
            book_url: book_url.into(),
            options,
            readiness: Readiness::default(),
            phase,
            events,
            persistence: Vec::new(),
            initial_location: None,
            current,
            current_toc_item: None,
            toc: Vec::new(),
            toc_unavailable: false,
            label_holder: TocLabelHolder::new(),
            highlights: HighlightStore::new(),
            selection: None,
            highlight_phase: HighlightPhase::Idle,
            stats: BridgeStats::default(),
        }
    }

    /// Seed the core with the persisted position and highlights
    pub fn with_saved_state(
        mut self,
        location: Option<Locator>,
        highlights: Vec<Highlight>,
    ) -> Self {
        self.initial_location = location;
        self.highlights = HighlightStore::from_highlights(highlights);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn book_url(&self) -> &str {
        &self.book_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.events.subscribe()
    }

    /// Unbounded feed of relocations and highlight changes. Every such
    /// event is delivered in order; the feed closes when the core drops.
    pub fn persistence_feed(&mut self) -> mpsc::UnboundedReceiver<ReaderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.persistence.push(tx);
        rx
    }

    pub fn watch_phase(&self) -> watch::Receiver<ReaderPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> ReaderPhase {
        self.phase.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.phase.borrow().is_ready()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn current_locator(&self) -> &Locator {
        &self.current
    }

    pub fn current_toc_item(&self) -> Option<&CurrentTocItem> {
        self.current_toc_item.as_ref()
    }

    pub fn toc(&self) -> &[TocLink] {
        &self.toc
    }

    /// Flattened TOC, recomputed on every call
    pub fn flattened_toc(&self) -> Vec<FlatTocItem<'_>> {
        toc::flatten(&self.toc)
    }

    /// Set when the backend returned no outline
    pub fn toc_unavailable(&self) -> bool {
        self.toc_unavailable
    }

    pub fn highlights(&self) -> &HighlightStore {
        &self.highlights
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn highlight_phase(&self) -> HighlightPhase {
        self.highlight_phase
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn theme(&self) -> &Theme {
        &self.options.theme
    }

    fn emit(&mut self, event: ReaderEvent) {
        tracing::trace!(event = event.name(), "reader event");
        if event.is_persistent() {
            self.persistence.retain(|feed| feed.send(event.clone()).is_ok());
        }
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Start loading. Backends without a handshake render right away;
    /// script backends wait for [`mark_script_loaded`](Self::mark_script_loaded)
    /// and `initiatedSwiftReader`.
    pub async fn open(&mut self) {
        if !self.backend.requires_handshake() {
            self.readiness.script_loaded = true;
            self.readiness.engine_constructed = true;
        }
        self.try_render().await;
    }

    /// The web view finished loading the engine script
    pub async fn mark_script_loaded(&mut self) {
        self.readiness.script_loaded = true;
        self.try_render().await;
    }

    async fn mark_engine_constructed(&mut self) {
        self.readiness.engine_constructed = true;
        self.try_render().await;
    }

    async fn try_render(&mut self) {
        if self.readiness.can_render() && !self.readiness.render_issued {
            // failures are reported through the phase channel
            let _ = self.render_book().await;
        }
    }

    /// Issue the render call. Requires both handshake flags; a second call
    /// after a render was issued does nothing.
    pub async fn render_book(&mut self) -> Result<(), ReaderError> {
        if !self.readiness.can_render() {
            return Err(ReaderError::NotReady);
        }
        if self.readiness.render_issued {
            return Ok(());
        }
        self.readiness.render_issued = true;

        let request = RenderRequest {
            url: self.book_url.clone(),
            initial: self
                .initial_location
                .as_ref()
                .and_then(InitialPosition::from_locator),
            extension_hint: self.options.extension_hint.clone(),
        };
        tracing::info!(url = %request.url, initial = ?request.initial, "rendering book");

        if let Err(e) = self.backend.render(&request).await {
            tracing::error!("Failed to render book: {}", e);
            let message = e.to_string();
            self.phase.send_replace(ReaderPhase::Failed(message.clone()));
            return Err(ReaderError::LoadFailed(message));
        }
        self.readiness.rendered = true;

        if let Some(initial) = self.initial_location.clone().filter(Locator::is_resolvable) {
            self.current = initial;
        }

        self.restore_highlights().await;
        self.refresh_toc().await;

        let theme = self.options.theme.clone();
        self.apply_theme(theme).await;
        Ok(())
    }

    async fn restore_highlights(&mut self) {
        let annotations: Vec<EngineAnnotation> = self
            .highlights
            .ordered()
            .into_iter()
            .filter_map(EngineAnnotation::from_highlight)
            .collect();
        if annotations.is_empty() {
            return;
        }

        tracing::debug!(count = annotations.len(), "restoring highlights");
        if let Err(e) = self.backend.set_annotations(&annotations).await {
            tracing::warn!("Failed to restore highlights: {}", e);
        }
    }

    /// Push appearance settings. Before the first render the theme is only
    /// stored; it is sent once the book is open.
    pub async fn apply_theme(&mut self, theme: Theme) {
        self.options.theme = theme;
        if !self.readiness.rendered {
            return;
        }

        if let Err(e) = self.backend.set_theme(&self.options.theme).await {
            tracing::warn!("Failed to apply theme: {}", e);
        }
        if !self.readiness.theme_applied {
            self.readiness.theme_applied = true;
            self.finish_loading().await;
        }
    }

    async fn finish_loading(&mut self) {
        if !self.readiness.can_finish() || *self.phase.borrow() != ReaderPhase::Loading {
            return;
        }
        if !self.options.ready_delay.is_zero() {
            tokio::time::sleep(self.options.ready_delay).await;
        }
        self.phase.send_replace(ReaderPhase::Ready);
        tracing::info!("reader ready");
    }

    /// Reload the table of contents from the backend. Labels remembered
    /// from the previous outline are dropped.
    pub async fn refresh_toc(&mut self) {
        self.label_holder.reset();
        match self.backend.table_of_contents().await {
            Ok(toc) => {
                self.toc_unavailable = toc.is_empty();
                self.toc = toc;
            }
            Err(e) => {
                tracing::warn!("Failed to load table of contents: {}", e);
                self.toc.clear();
                self.toc_unavailable = true;
            }
        }
        self.emit(ReaderEvent::TocChanged);
    }

    // ------------------------------------------------------------------
    // Engine messages
    // ------------------------------------------------------------------

    /// Handle a message posted by the engine with an already-parsed body
    pub async fn handle_message(&mut self, name: &str, body: &Value) {
        let decoded = EngineMessage::decode(name, body);
        self.dispatch(name, decoded).await;
    }

    /// Handle a message posted by the engine with a JSON text body
    pub async fn handle_message_str(&mut self, name: &str, body: &str) {
        let decoded = EngineMessage::decode_str(name, body);
        self.dispatch(name, decoded).await;
    }

    async fn dispatch(&mut self, name: &str, decoded: Result<EngineMessage, BridgeError>) {
        self.stats.record(&decoded);
        match decoded {
            Ok(message) => self.apply(message).await,
            Err(e) => tracing::warn!(handler = name, "Dropping engine message: {}", e),
        }
    }

    /// Apply a decoded engine message
    pub async fn apply(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::EngineConstructed => self.mark_engine_constructed().await,
            EngineMessage::Tap(point) => {
                if self.highlight_phase != HighlightPhase::Idle {
                    self.dismiss_selection();
                }
                self.emit(ReaderEvent::Tap(point));
            }
            EngineMessage::SelectedText(payload) => self.on_selected_text(payload),
            EngineMessage::Relocate(payload) => self.on_relocate(payload),
            EngineMessage::HighlightTapped(payload) => self.on_highlight_tapped(payload),
        }
    }

    fn on_selected_text(&mut self, payload: SelectedTextPayload) {
        let selection = Selection::from(&payload);
        if selection.is_empty() {
            self.dismiss_selection();
            return;
        }

        self.current.set_fragment(payload.value);
        self.current.text = Some(payload.text);
        self.update_selection(selection);
    }

    fn on_relocate(&mut self, payload: RelocatePayload) {
        let toc_label = payload
            .toc_item
            .as_ref()
            .map(|item| item.label.trim())
            .filter(|label| !label.is_empty());
        let title = self.label_holder.resolve(toc_label).map(str::to_string);

        if let Some(item) = payload.toc_item.as_ref().filter(|item| !item.href.is_empty()) {
            self.current_toc_item = Some(CurrentTocItem {
                label: item.label.trim().to_string(),
                href: item.href.clone(),
            });
        }

        let mut locator = Locator {
            kind: self.backend.kind(),
            title,
            updated_at: payload
                .updated_at
                .and_then(from_epoch_millis)
                .or_else(|| Some(Utc::now())),
            ..Default::default()
        };
        locator.locations.position = payload
            .section
            .map(|section| section.current)
            .or_else(|| cfi::spine_index(&payload.cfi));
        locator.locations.total_progression = Some(clamp_fraction(payload.fraction));
        locator.set_fragment(payload.cfi);

        tracing::debug!(
            fragment = locator.fragment().unwrap_or_default(),
            progression = ?locator.total_progression(),
            "relocated"
        );
        self.current = locator.clone();
        self.emit(ReaderEvent::Relocated(locator));
    }

    fn on_highlight_tapped(&mut self, payload: HighlightTapPayload) {
        let Some(highlight) = self.highlights.find_by_fragment(&payload.value).cloned() else {
            tracing::debug!(fragment = %payload.value, "tap on unknown highlight");
            return;
        };

        let mut selection = Selection::from(&payload);
        if selection.text.is_empty() {
            selection.text = highlight.text().unwrap_or_default().to_string();
        }

        self.highlights.select(highlight.id);
        self.highlight_phase = HighlightPhase::Editing;
        self.selection = Some(selection.clone());
        self.emit(ReaderEvent::SelectionChanged {
            selection,
            locator: highlight.locator.clone(),
            highlight: Some(highlight.id),
        });
    }

    // ------------------------------------------------------------------
    // Selection and highlights
    // ------------------------------------------------------------------

    /// Record a selection made in a native view (e.g. the PDF backend)
    pub fn update_selection(&mut self, selection: Selection) {
        if selection.is_empty() {
            self.dismiss_selection();
            return;
        }

        self.highlights.clear_selection();
        self.highlight_phase = HighlightPhase::Selecting;
        self.selection = Some(selection.clone());
        self.emit(ReaderEvent::SelectionChanged {
            selection,
            locator: self.current.clone(),
            highlight: None,
        });
    }

    /// Drop the selection and any selected highlight
    pub fn dismiss_selection(&mut self) {
        let had_selection = self.selection.is_some() || self.highlights.selected().is_some();
        self.selection = None;
        self.highlights.clear_selection();
        self.highlight_phase = HighlightPhase::Idle;
        if had_selection {
            self.emit(ReaderEvent::SelectionCleared);
        }
    }

    /// Ask the backend whether it has a live selection; errors read as `false`
    pub async fn has_selection(&self) -> bool {
        match self.backend.has_selection().await {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!("Failed to query selection: {}", e);
                false
            }
        }
    }

    /// Highlight the current selection. Does nothing without a non-empty
    /// selection or when the backend fails to draw it.
    pub async fn highlight_selection(&mut self, color: HighlightColor) -> Option<Highlight> {
        let Some(selection) = self.selection.clone().filter(|s| !s.is_empty()) else {
            tracing::debug!("highlight requested without a selection");
            return None;
        };

        let drawn = match self.backend.create_highlight(&selection.fragment, color).await {
            Ok(drawn) => drawn,
            Err(e) => {
                tracing::warn!("Failed to create highlight: {}", e);
                return None;
            }
        };

        let locator = self.highlight_locator(&drawn, Some(selection.text), None);
        let highlight = self.record_highlight(locator, color, drawn.index);
        self.selection = None;
        Some(highlight)
    }

    /// Remove a highlight from the maps and the backend. Unknown or already
    /// removed highlights are ignored.
    pub async fn remove_highlight(&mut self, highlight: &Highlight) -> bool {
        let Some(removed) = self.highlights.remove(&highlight.id) else {
            return false;
        };

        if let Err(e) = self.backend.remove_highlight(&removed).await {
            tracing::warn!("Failed to remove highlight {}: {}", removed.id, e);
        }
        if self.highlight_phase == HighlightPhase::Editing {
            self.selection = None;
            self.highlight_phase = HighlightPhase::Idle;
        }
        self.emit(ReaderEvent::Unhighlighted(removed));
        true
    }

    /// Change a highlight's color by removing it and drawing it again.
    ///
    /// When the new color cannot be drawn the old highlight is drawn back
    /// and kept: the store is unchanged and no event is published.
    pub async fn edit_highlight(
        &mut self,
        highlight: &Highlight,
        color: HighlightColor,
    ) -> Option<Highlight> {
        let existing = self.highlights.get(&highlight.id).cloned()?;
        let fragment = existing.fragment()?.to_string();

        if let Err(e) = self.backend.remove_highlight(&existing).await {
            tracing::warn!("Failed to remove highlight {}: {}", existing.id, e);
        }
        let drawn = match self.backend.create_highlight(&fragment, color).await {
            Ok(drawn) => drawn,
            Err(e) => {
                tracing::warn!("Failed to redraw highlight {} as {}: {}", existing.id, color, e);
                if let Err(e) = self.backend.create_highlight(&fragment, existing.color).await {
                    tracing::warn!("Failed to restore highlight {}: {}", existing.id, e);
                }
                return None;
            }
        };

        if let Some(removed) = self.highlights.remove(&existing.id) {
            self.emit(ReaderEvent::Unhighlighted(removed));
        }
        self.selection = None;

        let locator = self.highlight_locator(
            &drawn,
            existing.locator.text.clone(),
            existing.locator.title.clone(),
        );
        Some(self.record_highlight(locator, color, drawn.index))
    }

    fn highlight_locator(
        &self,
        drawn: &EngineHighlight,
        text: Option<String>,
        title: Option<String>,
    ) -> Locator {
        let mut locator = Locator {
            kind: self.backend.kind(),
            title: title
                .or_else(|| drawn.label.clone())
                .or_else(|| self.current.title.clone()),
            text: text
                .filter(|t| !t.trim().is_empty())
                .or_else(|| drawn.text.clone()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        locator.set_fragment(drawn.cfi.clone());
        locator.locations.position = Some(drawn.index);
        locator.locations.total_progression = self.current.total_progression();
        locator
    }

    fn record_highlight(
        &mut self,
        locator: Locator,
        color: HighlightColor,
        index: u32,
    ) -> Highlight {
        let mut highlight = Highlight::new(locator, color);
        highlight.engine_index = Some(index);

        self.highlights.insert(highlight.clone());
        self.highlights.clear_selection();
        self.highlight_phase = HighlightPhase::Highlighted;
        tracing::debug!(id = %highlight.id, color = %color, "highlighted");
        self.emit(ReaderEvent::Highlighted(highlight.clone()));
        highlight
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate to a fragment or href; failures are logged
    pub async fn go_to(&mut self, target: &str) {
        if let Err(e) = self.backend.go_to(target).await {
            tracing::warn!(destination = target, "Navigation failed: {}", e);
        }
    }

    pub async fn go_to_locator(&mut self, locator: &Locator) {
        let target = match (locator.fragment(), locator.kind, locator.position()) {
            (Some(fragment), _, _) => fragment.to_string(),
            (None, LocatorKind::Pdf, Some(page)) => toc::page_href(page),
            _ => {
                tracing::debug!("locator has no navigable target");
                return;
            }
        };
        self.go_to(&target).await;
    }

    pub async fn go_to_toc(&mut self, link: &TocLink) {
        if link.href.is_empty() {
            return;
        }
        let href = link.href.clone();
        self.go_to(&href).await;
    }

    /// Move the current position to a page of a paginated document.
    ///
    /// The label comes from the nearest preceding outline entry, falling
    /// back to the last known label when no entry matches.
    pub fn relocate_to_page(&mut self, page: u32, page_count: u32) {
        let found = {
            let flat = toc::flatten(&self.toc);
            toc::nearest_preceding(&flat, page)
                .map(|item| (item.link.title.clone(), item.link.href.clone()))
        };
        let title = self
            .label_holder
            .resolve(found.as_ref().map(|(label, _)| label.as_str()))
            .map(str::to_string);
        if let Some((label, href)) = found {
            self.current_toc_item = Some(CurrentTocItem { label, href });
        }

        let mut locator = Locator::pdf_page(page, page_count);
        locator.kind = self.backend.kind();
        locator.title = title;
        locator.updated_at = Some(Utc::now());

        self.current = locator.clone();
        self.emit(ReaderEvent::Relocated(locator));
    }
}

impl<V: PdfView> ReaderCore<PdfBackend<V>> {
    /// Read the page the PDF view is showing and relocate to it
    pub fn sync_page(&mut self) {
        let view = self.backend.view();
        let (page, count) = (view.current_page(), view.page_count());
        if self.current.position() == Some(page) {
            return;
        }
        self.relocate_to_page(page, count);
    }
}
