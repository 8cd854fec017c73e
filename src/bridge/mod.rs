//! Event bridge between the embedded engine and the reader core
//!
//! The engine posts named messages (`relocate`, `selectedText`, ...) with
//! JSON payloads from callbacks that run outside normal control flow.
//! This module turns them into [`EngineMessage`] values and keeps
//! counters of what was delivered, dropped or unrecognised.
//!
//! | Handler                | Payload                                                   |
//! |------------------------|-----------------------------------------------------------|
//! | `initiatedSwiftReader` | none                                                      |
//! | `tapHandler`           | `{x, y}`                                                  |
//! | `selectedText`         | `{text, x, y, width, height, dir, value, index}`          |
//! | `relocate`             | `{cfi, fraction, updatedAt?, location, section, time, tocItem}` |
//! | `didTapHighlight`      | `{value, x, y, width, height, dir, text, index, color}`   |

mod message;

use std::collections::BTreeMap;

pub use message::{
    BridgeError, EngineMessage, HandlerName, HighlightTapPayload, LocationInfo, Point,
    RelocatePayload, SectionInfo, SelectedTextPayload, TimeInfo, TocItemPayload,
};

/// Delivery counters, exposed for telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Messages decoded and applied
    pub delivered: u64,
    /// Messages with a known handler but an undecodable payload
    pub dropped: u64,
    /// Messages posted to unknown handler names, by name
    pub unknown: BTreeMap<String, u64>,
}

impl BridgeStats {
    /// Record the outcome of a decode attempt
    pub fn record(&mut self, outcome: &Result<EngineMessage, BridgeError>) {
        match outcome {
            Ok(_) => self.delivered += 1,
            Err(BridgeError::UnknownHandler(name)) => {
                *self.unknown.entry(name.clone()).or_default() += 1;
            }
            Err(_) => self.dropped += 1,
        }
    }

    pub fn unknown_total(&self) -> u64 {
        self.unknown.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_count_each_outcome() {
        let mut stats = BridgeStats::default();
        stats.record(&EngineMessage::decode("tapHandler", &json!({"x": 1, "y": 2})));
        stats.record(&EngineMessage::decode("tapHandler", &json!({"x": 1})));
        stats.record(&EngineMessage::decode("pageTurned", &json!({})));
        stats.record(&EngineMessage::decode("pageTurned", &json!({})));

        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.unknown.get("pageTurned"), Some(&2));
        assert_eq!(stats.unknown_total(), 2);
    }
}
