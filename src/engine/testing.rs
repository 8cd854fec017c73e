//! Recording fakes for backend tests

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{EngineError, Result};
use super::pdf::{PdfAppearance, PdfTarget, PdfView};
use super::script::ScriptRuntime;
use super::theme::Theme;
use super::traits::Backend;
use super::types::{EngineAnnotation, EngineHighlight, RenderRequest};
use crate::cfi;
use crate::highlight::{Highlight, HighlightColor};
use crate::locator::LocatorKind;
use crate::toc::{PdfOutlineNode, TocLink};

enum Reply {
    Value(Value),
    Fail(String),
}

/// Script runtime that records every script and answers by substring match
#[derive(Default)]
pub struct RecordingRuntime {
    scripts: Mutex<Vec<String>>,
    replies: Mutex<Vec<(String, Reply)>>,
}

impl RecordingRuntime {
    pub fn respond(&self, needle: &str, value: Value) {
        self.replies
            .lock()
            .unwrap()
            .push((needle.to_string(), Reply::Value(value)));
    }

    pub fn fail(&self, needle: &str, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push((needle.to_string(), Reply::Fail(message.to_string())));
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptRuntime for RecordingRuntime {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.scripts.lock().unwrap().push(script.to_string());
        let replies = self.replies.lock().unwrap();
        match replies.iter().find(|(needle, _)| script.contains(needle.as_str())) {
            Some((_, Reply::Value(value))) => Ok(value.clone()),
            Some((_, Reply::Fail(message))) => Err(EngineError::Script(message.clone())),
            None => Ok(Value::Null),
        }
    }
}

/// Calls observed by [`FakeBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Render(RenderRequest),
    GoTo(String),
    TableOfContents,
    SetTheme,
    CreateHighlight(String, HighlightColor),
    RemoveHighlight(String),
    SetAnnotations(Vec<EngineAnnotation>),
    HasSelection,
}

/// In-memory backend with scripted failures
pub struct FakeBackend {
    kind: LocatorKind,
    handshake: bool,
    toc: Vec<TocLink>,
    calls: Mutex<Vec<BackendCall>>,
    pub fail_render: bool,
    pub fail_highlight: bool,
    pub fail_toc: bool,
    pub selection: bool,
}

impl FakeBackend {
    pub fn book() -> Self {
        Self {
            kind: LocatorKind::Book,
            handshake: true,
            toc: Vec::new(),
            calls: Mutex::new(Vec::new()),
            fail_render: false,
            fail_highlight: false,
            fail_toc: false,
            selection: false,
        }
    }

    pub fn pdf() -> Self {
        Self {
            kind: LocatorKind::Pdf,
            handshake: false,
            ..Self::book()
        }
    }

    pub fn with_toc(mut self, toc: Vec<TocLink>) -> Self {
        self.toc = toc;
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn kind(&self) -> LocatorKind {
        self.kind
    }

    fn requires_handshake(&self) -> bool {
        self.handshake
    }

    async fn render(&self, request: &RenderRequest) -> Result<()> {
        self.record(BackendCall::Render(request.clone()));
        if self.fail_render {
            return Err(EngineError::Script("failed to open book".to_string()));
        }
        Ok(())
    }

    async fn go_to(&self, target: &str) -> Result<()> {
        self.record(BackendCall::GoTo(target.to_string()));
        Ok(())
    }

    async fn table_of_contents(&self) -> Result<Vec<TocLink>> {
        self.record(BackendCall::TableOfContents);
        if self.fail_toc {
            return Err(EngineError::Script("book is undefined".to_string()));
        }
        Ok(self.toc.clone())
    }

    async fn set_theme(&self, _theme: &Theme) -> Result<()> {
        self.record(BackendCall::SetTheme);
        Ok(())
    }

    async fn create_highlight(
        &self,
        fragment: &str,
        color: HighlightColor,
    ) -> Result<EngineHighlight> {
        self.record(BackendCall::CreateHighlight(fragment.to_string(), color));
        if self.fail_highlight {
            return Err(EngineError::Script("range not found".to_string()));
        }
        Ok(EngineHighlight {
            index: cfi::spine_index(fragment).unwrap_or_default(),
            label: Some("Chapter".to_string()),
            cfi: fragment.to_string(),
            text: None,
        })
    }

    async fn remove_highlight(&self, highlight: &Highlight) -> Result<()> {
        self.record(BackendCall::RemoveHighlight(
            highlight.fragment().unwrap_or_default().to_string(),
        ));
        Ok(())
    }

    async fn set_annotations(&self, annotations: &[EngineAnnotation]) -> Result<()> {
        self.record(BackendCall::SetAnnotations(annotations.to_vec()));
        Ok(())
    }

    async fn has_selection(&self) -> Result<bool> {
        self.record(BackendCall::HasSelection);
        Ok(self.selection)
    }
}

/// PDF view double tracking page, outline and drawn highlights
pub struct FakePdfView {
    page_count: u32,
    page: Mutex<u32>,
    url: Mutex<Option<String>>,
    outline: Option<Vec<PdfOutlineNode>>,
    highlights: Mutex<Vec<PdfTarget>>,
    appearance: Mutex<Option<PdfAppearance>>,
}

impl FakePdfView {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            page: Mutex::new(0),
            url: Mutex::new(None),
            outline: None,
            highlights: Mutex::new(Vec::new()),
            appearance: Mutex::new(None),
        }
    }

    pub fn with_outline(mut self, outline: Vec<PdfOutlineNode>) -> Self {
        self.outline = Some(outline);
        self
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.url.lock().unwrap().clone()
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.lock().unwrap().len()
    }

    pub fn appearance(&self) -> Option<PdfAppearance> {
        self.appearance.lock().unwrap().clone()
    }
}

impl PdfView for FakePdfView {
    fn load(&self, url: &str) -> Result<()> {
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn current_page(&self) -> u32 {
        *self.page.lock().unwrap()
    }

    fn go_to_page(&self, page: u32) -> Result<()> {
        *self.page.lock().unwrap() = page;
        Ok(())
    }

    fn outline(&self) -> Option<Vec<PdfOutlineNode>> {
        self.outline.clone()
    }

    fn set_appearance(&self, appearance: &PdfAppearance) -> Result<()> {
        *self.appearance.lock().unwrap() = Some(appearance.clone());
        Ok(())
    }

    fn add_highlight(&self, target: &PdfTarget, _color: HighlightColor) -> Result<()> {
        self.highlights.lock().unwrap().push(*target);
        Ok(())
    }

    fn remove_highlight(&self, target: &PdfTarget) -> Result<()> {
        self.highlights.lock().unwrap().retain(|t| t != target);
        Ok(())
    }

    fn has_selection(&self) -> bool {
        false
    }
}
