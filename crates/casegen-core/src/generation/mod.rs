//! Generation domain module.
//!
//! # Module Structure
//!
//! - `request`: Prompt, format and wire bodies of outbound requests
//! - `event`: Progress events surfaced to the caller (`DocumentEvent`)
//! - `transport`: The seam to whatever carries the frame stream

mod event;
mod request;
mod transport;

pub use event::{DocumentEvent, DocumentNotice, ExchangeId, ExchangeKind};
pub use request::{
    ConversationBody, FormatKind, FormatOptions, GenerationBody, GenerationPrompt,
    OutboundRequest,
};
pub use transport::{FragmentStream, StreamTransport};
