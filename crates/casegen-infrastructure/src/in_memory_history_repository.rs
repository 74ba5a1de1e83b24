//! In-memory history repository.
//!
//! Backs offline runs and tests. Records get a fresh server-side id on
//! creation, the same way the remote service assigns its own ids.

use async_trait::async_trait;
use casegen_core::error::{CasegenError, Result};
use casegen_core::requirement::RequirementRef;
use casegen_core::version::{HistoryRecord, HistoryRepository, RecordContext, VersionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    records: RwLock<HashMap<RequirementRef, Vec<HistoryRecord>>>,
    reject_writes: AtomicBool,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with records of one requirement.
    pub fn with_records(requirement: RequirementRef, records: Vec<HistoryRecord>) -> Self {
        Self {
            records: RwLock::new(HashMap::from([(requirement, records)])),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent create/update/delete fail with a data access error.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(CasegenError::data_access("history backend rejected the write"));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn list(&self, requirement: &RequirementRef) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read().await;
        let mut listed = records.get(requirement).cloned().unwrap_or_default();
        listed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(listed)
    }

    async fn create(
        &self,
        context: RecordContext<'_>,
        record: &HistoryRecord,
    ) -> Result<Option<VersionId>> {
        self.check_writable()?;

        let id = VersionId::generate();
        let mut stored = record.clone();
        stored.id = id.clone();
        if stored.requirement_title.is_none() {
            stored.requirement_title = Some(context.details.title.clone());
        }

        self.records
            .write()
            .await
            .entry(context.requirement.clone())
            .or_default()
            .push(stored);
        Ok(Some(id))
    }

    async fn update(&self, context: RecordContext<'_>, record: &HistoryRecord) -> Result<()> {
        self.check_writable()?;

        let mut records = self.records.write().await;
        let stored = records
            .get_mut(context.requirement)
            .and_then(|list| list.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| CasegenError::not_found("history record", record.id.as_str()))?;

        stored.content = record.content.clone();
        stored.timestamp = record.timestamp;
        stored.origin = record.origin;
        Ok(())
    }

    async fn delete(&self, id: &VersionId) -> Result<()> {
        self.check_writable()?;

        let mut records = self.records.write().await;
        for list in records.values_mut() {
            if let Some(index) = list.iter().position(|r| &r.id == id) {
                list.remove(index);
                return Ok(());
            }
        }
        Err(CasegenError::not_found("history record", id.as_str()))
    }
}
