//! Protocol frames produced by the response stream.

use serde::{Deserialize, Serialize};

/// Payload marking normal termination of a response stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single decoded frame of a generation or conversation response.
///
/// Frames are ordered and must be consumed in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Partial text produced so far.
    TextChunk { text: String },
    /// Complete replacement for the document under edit.
    Directive {
        updated_document: String,
        #[serde(default)]
        note: Option<String>,
    },
    /// Producer-side failure; nothing follows it.
    ErrorFrame { message: String },
    /// Normal end of stream; nothing follows it.
    End,
}

impl StreamFrame {
    /// Returns true if no frame may follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ErrorFrame { .. } | Self::End)
    }
}
