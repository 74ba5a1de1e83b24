//! Document version types.

use crate::requirement::RequirementRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a document version.
///
/// Locally appended versions carry a UUID until the history backend
/// confirms them under its own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh local identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How a version's current content came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    /// Produced by a fresh generation.
    Generated,
    /// Edited by hand.
    ManualEdit,
    /// Rewritten by the conversational agent.
    AgentEdit,
}

impl VersionOrigin {
    /// Wire value of the history backend's `update_type` field.
    pub fn as_update_type(&self) -> &'static str {
        match self {
            VersionOrigin::Generated => "generated",
            VersionOrigin::ManualEdit => "manual_edit",
            VersionOrigin::AgentEdit => "ai_assistant",
        }
    }

    /// Parses the backend's `update_type`; unknown or missing values are
    /// treated as generated content.
    pub fn from_update_type(value: Option<&str>) -> Self {
        match value {
            Some("manual_edit") => VersionOrigin::ManualEdit,
            Some("ai_assistant") => VersionOrigin::AgentEdit,
            _ => VersionOrigin::Generated,
        }
    }

    /// Label shown next to a version in history listings.
    pub fn label(&self) -> &'static str {
        match self {
            VersionOrigin::Generated => "Generated",
            VersionOrigin::ManualEdit => "Manual Edit",
            VersionOrigin::AgentEdit => "AI Assistant",
        }
    }
}

/// One entry of a requirement's document history.
///
/// Fields are read-only outside the history store; the store is the only
/// place a version's content is ever rewritten (see `VersionHistory::reconcile`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub(crate) id: VersionId,
    pub(crate) requirement: RequirementRef,
    pub(crate) content: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) origin: VersionOrigin,
    pub(crate) sequence_number: u64,
}

impl DocumentVersion {
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    pub fn requirement(&self) -> &RequirementRef {
        &self.requirement
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last content change.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn origin(&self) -> VersionOrigin {
        self.origin
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }
}

/// Content for a version that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDraft {
    pub content: String,
    pub origin: VersionOrigin,
    /// When the operation producing this content was issued.
    ///
    /// For generations this is the moment the request went out, not the
    /// moment the stream completed.
    pub issued_at: DateTime<Utc>,
}

impl VersionDraft {
    pub fn new(content: impl Into<String>, origin: VersionOrigin, issued_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            origin,
            issued_at,
        }
    }
}

/// A locally produced edit to be written over an existing version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEdit {
    pub content: String,
    pub origin: VersionOrigin,
    pub edited_at: DateTime<Utc>,
}

impl LocalEdit {
    pub fn new(content: impl Into<String>, origin: VersionOrigin, edited_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            origin,
            edited_at,
        }
    }
}

/// A history entry as stored by the history backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: VersionId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub origin: VersionOrigin,
    /// Backend-side version number, when the backend tracks one.
    pub version_number: Option<u64>,
    pub requirement_title: Option<String>,
}

impl HistoryRecord {
    /// Builds the record representing a local version.
    pub fn from_version(version: &DocumentVersion, requirement_title: Option<String>) -> Self {
        Self {
            id: version.id.clone(),
            content: version.content.clone(),
            timestamp: version.updated_at,
            origin: version.origin,
            version_number: Some(version.sequence_number),
            requirement_title,
        }
    }
}
