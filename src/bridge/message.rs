//! Engine message contracts
//!
//! Every message posted by the engine carries a handler name and a JSON
//! payload. Names form a closed set; payloads are decoded into typed
//! structs and anything that does not match is reported as an error for
//! the dispatcher to log and drop.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Bridge decoding errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unknown message handler: {0}")]
    UnknownHandler(String),

    #[error("Invalid JSON for {handler}: {source}")]
    InvalidJson {
        handler: HandlerName,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed {handler} payload: {source}")]
    Payload {
        handler: HandlerName,
        #[source]
        source: serde_json::Error,
    },
}

/// Names of the message handlers the engine posts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerName {
    /// The engine's reader object has been constructed
    EngineConstructed,
    Tap,
    SelectedText,
    Relocate,
    HighlightTapped,
}

impl HandlerName {
    pub const ALL: [HandlerName; 5] = [
        HandlerName::EngineConstructed,
        HandlerName::Tap,
        HandlerName::SelectedText,
        HandlerName::Relocate,
        HandlerName::HighlightTapped,
    ];

    /// Name as registered with the web view
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerName::EngineConstructed => "initiatedSwiftReader",
            HandlerName::Tap => "tapHandler",
            HandlerName::SelectedText => "selectedText",
            HandlerName::Relocate => "relocate",
            HandlerName::HighlightTapped => "didTapHighlight",
        }
    }
}

impl fmt::Display for HandlerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerName {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandlerName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownHandler(s.to_string()))
    }
}

/// Point in view coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// `selectedText` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectedTextPayload {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Placement hint, `"up"` or `"down"`
    #[serde(default)]
    pub dir: Option<String>,
    /// CFI of the selection
    pub value: String,
    /// Section index
    #[serde(default)]
    pub index: Option<u32>,
}

/// `relocate` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocatePayload {
    pub cfi: String,
    pub fraction: f64,
    /// Epoch milliseconds
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub location: Option<LocationInfo>,
    #[serde(default)]
    pub section: Option<SectionInfo>,
    #[serde(default)]
    pub time: Option<TimeInfo>,
    #[serde(default)]
    pub toc_item: Option<TocItemPayload>,
}

/// Location counters reported on relocate
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct LocationInfo {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub next: u32,
    #[serde(default)]
    pub total: u32,
}

/// Current section and section count
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SectionInfo {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub total: u32,
}

/// Estimated minutes left in the section and in the book
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TimeInfo {
    #[serde(default)]
    pub section: f64,
    #[serde(default)]
    pub total: f64,
}

/// TOC entry the engine considers current
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TocItemPayload {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub id: Option<i64>,
}

/// `didTapHighlight` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HighlightTapPayload {
    /// CFI of the tapped highlight
    pub value: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

/// A decoded engine message
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    EngineConstructed,
    Tap(Point),
    SelectedText(SelectedTextPayload),
    Relocate(RelocatePayload),
    HighlightTapped(HighlightTapPayload),
}

impl EngineMessage {
    /// Decode a message whose body is JSON text
    pub fn decode_str(name: &str, body: &str) -> Result<Self, BridgeError> {
        let handler: HandlerName = name.parse()?;
        if handler == HandlerName::EngineConstructed {
            return Ok(EngineMessage::EngineConstructed);
        }
        let value: Value = serde_json::from_str(body)
            .map_err(|source| BridgeError::InvalidJson { handler, source })?;
        Self::decode_handler(handler, &value)
    }

    /// Decode a message whose body was already parsed by the host
    pub fn decode(name: &str, body: &Value) -> Result<Self, BridgeError> {
        let handler: HandlerName = name.parse()?;
        Self::decode_handler(handler, body)
    }

    fn decode_handler(handler: HandlerName, body: &Value) -> Result<Self, BridgeError> {
        // the engine posts JSON.stringify(...) output, which may arrive as a string
        let parsed;
        let body = match body {
            Value::String(text) if handler != HandlerName::EngineConstructed => {
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|source| BridgeError::InvalidJson { handler, source })?;
                &parsed
            }
            other => other,
        };

        Ok(match handler {
            HandlerName::EngineConstructed => EngineMessage::EngineConstructed,
            HandlerName::Tap => EngineMessage::Tap(payload(handler, body)?),
            HandlerName::SelectedText => EngineMessage::SelectedText(payload(handler, body)?),
            HandlerName::Relocate => EngineMessage::Relocate(payload(handler, body)?),
            HandlerName::HighlightTapped => {
                EngineMessage::HighlightTapped(payload(handler, body)?)
            }
        })
    }

    pub fn handler(&self) -> HandlerName {
        match self {
            EngineMessage::EngineConstructed => HandlerName::EngineConstructed,
            EngineMessage::Tap(_) => HandlerName::Tap,
            EngineMessage::SelectedText(_) => HandlerName::SelectedText,
            EngineMessage::Relocate(_) => HandlerName::Relocate,
            EngineMessage::HighlightTapped(_) => HandlerName::HighlightTapped,
        }
    }
}

fn payload<T: DeserializeOwned>(handler: HandlerName, body: &Value) -> Result<T, BridgeError> {
    T::deserialize(body).map_err(|source| BridgeError::Payload { handler, source })
}
