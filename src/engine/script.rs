//! Script-engine backend
//!
//! Reflowable books are rendered by a JavaScript reader living in a web
//! view and reachable as `globalReader`. The host only has to provide a
//! [`ScriptRuntime`] that evaluates a script and awaits the resulting
//! promise; every RPC is built here as a script string with JSON-encoded
//! arguments.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::error::{EngineError, Result};
use super::theme::Theme;
use super::traits::Backend;
use super::types::{EngineAnnotation, EngineHighlight, InitialPosition, RenderRequest};
use crate::highlight::{Highlight, HighlightColor};
use crate::locator::LocatorKind;
use crate::toc::{EngineTocItem, TocLink};

/// Name of the reader object exposed by the engine
pub const READER_OBJECT: &str = "globalReader";

/// Evaluates scripts inside the hosting web view
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    /// Evaluate `script`, awaiting it if it yields a promise.
    ///
    /// A thrown exception or rejected promise is an `EngineError::Script`.
    async fn evaluate(&self, script: &str) -> Result<Value>;
}

/// Build `globalReader.<method>(<args>)` with JSON-encoded arguments
pub fn reader_call(method: &str, args: &[Value]) -> Result<String> {
    let args = args
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(format!("{}.{}({})", READER_OBJECT, method, args.join(",")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Backend driving the script engine through a [`ScriptRuntime`]
pub struct ScriptBackend<R> {
    runtime: R,
}

impl<R: ScriptRuntime> ScriptBackend<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let script = reader_call(method, args)?;
        tracing::trace!(%script, "evaluating engine call");
        self.runtime.evaluate(&script).await
    }
}

#[async_trait]
impl<R: ScriptRuntime> Backend for ScriptBackend<R> {
    fn kind(&self) -> LocatorKind {
        LocatorKind::Book
    }

    async fn render(&self, request: &RenderRequest) -> Result<()> {
        let initial = match &request.initial {
            Some(InitialPosition::Fragment(fragment)) => Value::String(fragment.clone()),
            Some(InitialPosition::Progression(fraction)) => Value::from(*fraction),
            None => Value::Null,
        };
        let hint = request
            .extension_hint
            .as_ref()
            .map(|ext| Value::String(ext.clone()))
            .unwrap_or(Value::Null);

        self.call("initBook", &[Value::String(request.url.clone()), initial, hint])
            .await?;
        Ok(())
    }

    async fn go_to(&self, target: &str) -> Result<()> {
        self.call("goTo", &[Value::String(target.to_string())]).await?;
        Ok(())
    }

    async fn table_of_contents(&self) -> Result<Vec<TocLink>> {
        let script = format!("JSON.stringify({}.book.toc ?? [])", READER_OBJECT);
        let value = self.runtime.evaluate(&script).await?;

        let items: Vec<EngineTocItem> = match value {
            Value::String(json) => serde_json::from_str(&json)?,
            Value::Null => Vec::new(),
            other => serde_json::from_value(other)?,
        };
        Ok(items.into_iter().map(TocLink::from).collect())
    }

    async fn set_theme(&self, theme: &Theme) -> Result<()> {
        self.call("setTheme", &[to_value(theme)?]).await?;
        Ok(())
    }

    async fn create_highlight(
        &self,
        fragment: &str,
        color: HighlightColor,
    ) -> Result<EngineHighlight> {
        let value = self
            .call(
                "makeHighlightCFI",
                &[Value::String(fragment.to_string()), to_value(&color.descriptor())?],
            )
            .await?;

        if value.is_null() {
            return Err(EngineError::UnexpectedResult {
                call: "makeHighlightCFI",
                detail: "null result".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| EngineError::UnexpectedResult {
            call: "makeHighlightCFI",
            detail: e.to_string(),
        })
    }

    async fn remove_highlight(&self, highlight: &Highlight) -> Result<()> {
        let reference = EngineAnnotation::reference(highlight).ok_or_else(|| {
            EngineError::InvalidTarget(format!("highlight {} has no fragment", highlight.id))
        })?;
        self.call("removeAnnotation", &[to_value(&reference)?]).await?;
        Ok(())
    }

    async fn set_annotations(&self, annotations: &[EngineAnnotation]) -> Result<()> {
        self.call("setAnnotations", &[to_value(&annotations)?]).await?;
        Ok(())
    }

    async fn has_selection(&self) -> Result<bool> {
        match self.call("hasSelection", &[]).await? {
            Value::Bool(selected) => Ok(selected),
            other => Err(EngineError::UnexpectedResult {
                call: "hasSelection",
                detail: other.to_string(),
            }),
        }
    }
}
