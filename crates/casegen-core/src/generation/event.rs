use crate::requirement::RequirementRef;
use crate::version::{VersionId, VersionOrigin};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one streamed exchange (the id of its generation session).
pub type ExchangeId = Uuid;

/// Which mutation path an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    Generation,
    Conversation,
}

/// Progress events emitted to the caller for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentEvent {
    /// The outbound request was issued.
    Started { kind: ExchangeKind },
    /// A piece of streamed text arrived.
    ChunkReceived { kind: ExchangeKind, text: String },
    /// The active document changed.
    DocumentReplaced {
        version_id: VersionId,
        content: String,
        origin: VersionOrigin,
    },
    /// A version was stored without becoming active.
    VersionAppended { version_id: VersionId },
    /// The history backend rejected a write; local state was kept.
    SaveFailed { message: String },
    /// The exchange failed. Emitted at most once per exchange.
    Error { kind: ExchangeKind, message: String },
    /// The exchange finished normally.
    Done { kind: ExchangeKind },
    /// The exchange was stopped by the caller.
    Cancelled { kind: ExchangeKind },
}

/// A `DocumentEvent` tagged with the document and exchange it belongs to.
///
/// Events of direct history operations (`edit_in_place`, `set_active`,
/// `delete_version`) carry no exchange id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNotice {
    pub requirement: RequirementRef,
    pub exchange_id: Option<ExchangeId>,
    #[serde(flatten)]
    pub event: DocumentEvent,
}
