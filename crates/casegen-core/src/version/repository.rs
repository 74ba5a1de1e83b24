//! History repository trait.
//!
//! Defines the interface of the backend that persists document versions.

use super::model::{HistoryRecord, VersionId};
use crate::error::Result;
use crate::requirement::{RequirementDetails, RequirementRef};
use async_trait::async_trait;

/// Requirement data stored alongside every history record.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub requirement: &'a RequirementRef,
    pub details: &'a RequirementDetails,
}

/// An abstract backend for document history.
///
/// `VersionHistory::append` is persisted through `create`,
/// `VersionHistory::reconcile` through `update`. Implementations may live on
/// a remote service or in memory.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Lists every record of a requirement.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<HistoryRecord>)`: Records in any order
    /// - `Err(_)`: Backend unreachable or response unreadable
    async fn list(&self, requirement: &RequirementRef) -> Result<Vec<HistoryRecord>>;

    /// Creates a new record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))`: The id the backend assigned to the record
    /// - `Ok(None)`: The record was stored but the backend did not report an id
    /// - `Err(_)`: The record was not stored
    async fn create(
        &self,
        context: RecordContext<'_>,
        record: &HistoryRecord,
    ) -> Result<Option<VersionId>>;

    /// Updates an existing record in place.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Record updated
    /// - `Err(CasegenError::NotFound)`: No record with that id
    /// - `Err(_)`: Other backend failure
    async fn update(&self, context: RecordContext<'_>, record: &HistoryRecord) -> Result<()>;

    /// Deletes a record.
    async fn delete(&self, id: &VersionId) -> Result<()>;
}
