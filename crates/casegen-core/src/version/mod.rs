//! Document version domain module.
//!
//! # Module Structure
//!
//! - `model`: Version types (`DocumentVersion`, `VersionId`, `VersionOrigin`)
//! - `history`: The in-memory store with the active pointer (`VersionHistory`)
//! - `repository`: Repository trait for the history backend

mod history;
mod model;
mod repository;

pub use history::{Activation, ReconcileOutcome, VersionHistory};
pub use model::{
    DocumentVersion, HistoryRecord, LocalEdit, VersionDraft, VersionId, VersionOrigin,
};
pub use repository::{HistoryRepository, RecordContext};
