//! Version history store.
//!
//! `VersionHistory` keeps the ordered versions of one requirement's document
//! together with the single active pointer. The pointer is maintained here
//! and nowhere else; callers query `is_active` instead of recomputing it.

use super::model::{DocumentVersion, HistoryRecord, LocalEdit, VersionDraft, VersionId};
use crate::error::{CasegenError, Result};
use crate::requirement::RequirementRef;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Result of `VersionHistory::reconcile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An existing version was rewritten in place.
    Updated(VersionId),
    /// No version could be targeted, so a new one was appended.
    Appended(VersionId),
}

impl ReconcileOutcome {
    pub fn version_id(&self) -> &VersionId {
        match self {
            ReconcileOutcome::Updated(id) | ReconcileOutcome::Appended(id) => id,
        }
    }
}

/// Result of `VersionHistory::append_completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The new version became active.
    Activated(VersionId),
    /// The new version was stored but the active version was updated after
    /// the completing operation was issued, so it stays active.
    Deferred(VersionId),
}

impl Activation {
    pub fn version_id(&self) -> &VersionId {
        match self {
            Activation::Activated(id) | Activation::Deferred(id) => id,
        }
    }

    pub fn is_activated(&self) -> bool {
        matches!(self, Activation::Activated(_))
    }
}

/// Ordered document versions of a single requirement plus the active pointer.
///
/// Invariants:
/// - `active_id` is `None` or the id of a version in `versions`
/// - sequence numbers strictly increase in insertion order and never change
/// - `unsaved` only names versions in `versions`
#[derive(Debug, Clone)]
pub struct VersionHistory {
    requirement: RequirementRef,
    versions: Vec<DocumentVersion>,
    active_id: Option<VersionId>,
    last_sequence: u64,
    /// Versions whose latest content the backend has not acknowledged.
    unsaved: HashSet<VersionId>,
}

impl VersionHistory {
    /// Creates an empty history.
    pub fn new(requirement: RequirementRef) -> Self {
        Self {
            requirement,
            versions: Vec::new(),
            active_id: None,
            last_sequence: 0,
            unsaved: HashSet::new(),
        }
    }

    /// Builds a history from backend records. No version is active until the
    /// caller activates one or mutates the history.
    pub fn from_records(requirement: RequirementRef, records: Vec<HistoryRecord>) -> Self {
        let mut history = Self::new(requirement);
        history.merge_records(records);
        history
    }

    pub fn requirement(&self) -> &RequirementRef {
        &self.requirement
    }

    pub fn versions(&self) -> &[DocumentVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, id: &VersionId) -> Option<&DocumentVersion> {
        self.versions.iter().find(|v| &v.id == id)
    }

    pub fn contains(&self, id: &VersionId) -> bool {
        self.get(id).is_some()
    }

    pub fn active_id(&self) -> Option<&VersionId> {
        self.active_id.as_ref()
    }

    pub fn active(&self) -> Option<&DocumentVersion> {
        self.active_id.as_ref().and_then(|id| self.get(id))
    }

    pub fn is_active(&self, id: &VersionId) -> bool {
        self.active_id.as_ref() == Some(id)
    }

    /// Returns true while the backend has not stored the version's current
    /// content.
    pub fn is_unsaved(&self, id: &VersionId) -> bool {
        self.unsaved.contains(id)
    }

    /// Newest version by sequence number.
    pub fn latest(&self) -> Option<&DocumentVersion> {
        self.versions.iter().max_by_key(|v| v.sequence_number)
    }

    /// Appends a new version under a fresh local id and makes it active.
    pub fn append(&mut self, draft: VersionDraft) -> VersionId {
        let id = self.insert(draft);
        self.active_id = Some(id.clone());
        id
    }

    /// Appends the result of a completed generation.
    ///
    /// The new version only takes over the active pointer when its operation
    /// was issued after the active version's last update. A generation that
    /// was started before the user's latest edit is kept in the history but
    /// does not replace what the user is looking at.
    pub fn append_completed(&mut self, draft: VersionDraft) -> Activation {
        let stale = self
            .active()
            .is_some_and(|active| draft.issued_at <= active.updated_at);

        if stale {
            let id = self.insert(draft);
            tracing::debug!(
                "[VersionHistory] {} appended {} without activation (stale completion)",
                self.requirement,
                id
            );
            Activation::Deferred(id)
        } else {
            Activation::Activated(self.append(draft))
        }
    }

    /// Makes the newest version active and returns its id.
    pub fn activate_latest(&mut self) -> Option<VersionId> {
        self.active_id = self.latest().map(|v| v.id.clone());
        self.active_id.clone()
    }

    /// Moves the active pointer. Storage order is not touched.
    pub fn set_active(&mut self, id: &VersionId) -> Result<()> {
        if !self.contains(id) {
            return Err(CasegenError::not_found("version", id.as_str()));
        }
        self.active_id = Some(id.clone());
        Ok(())
    }

    /// Writes a local edit over an existing version.
    ///
    /// The target is `active_hint` when it names a version of this history,
    /// otherwise the active version. The target keeps its id and sequence
    /// number, takes the new content, timestamp and origin, and becomes
    /// active. With nothing to target the edit is appended instead.
    pub fn reconcile(&mut self, edit: LocalEdit, active_hint: Option<&VersionId>) -> ReconcileOutcome {
        let target = match active_hint {
            Some(hint) if self.contains(hint) => Some(hint.clone()),
            Some(hint) => {
                tracing::debug!(
                    "[VersionHistory] hint {} not in history of {}, using active version",
                    hint,
                    self.requirement
                );
                self.active_id.clone()
            }
            None => self.active_id.clone(),
        };

        let Some(target) = target else {
            let id = self.append(VersionDraft::new(edit.content, edit.origin, edit.edited_at));
            return ReconcileOutcome::Appended(id);
        };

        if let Some(version) = self.versions.iter_mut().find(|v| v.id == target) {
            version.content = edit.content;
            version.updated_at = edit.edited_at;
            version.origin = edit.origin;
        }
        self.unsaved.insert(target.clone());
        self.active_id = Some(target.clone());
        ReconcileOutcome::Updated(target)
    }

    /// Re-keys a locally appended version to the id assigned by the backend.
    /// The version counts as saved afterwards.
    pub fn confirm_id(&mut self, local: &VersionId, confirmed: VersionId) -> Result<()> {
        if local == &confirmed {
            self.unsaved.remove(local);
            return Ok(());
        }
        if self.contains(&confirmed) {
            return Err(CasegenError::internal(format!(
                "version id {} is already present in history of {}",
                confirmed, self.requirement
            )));
        }

        let version = self
            .versions
            .iter_mut()
            .find(|v| &v.id == local)
            .ok_or_else(|| CasegenError::not_found("version", local.as_str()))?;
        version.id = confirmed.clone();
        self.unsaved.remove(local);

        if self.active_id.as_ref() == Some(local) {
            self.active_id = Some(confirmed);
        }
        Ok(())
    }

    /// Removes a version. When the active version is removed the newest
    /// remaining version becomes active.
    pub fn remove(&mut self, id: &VersionId) -> Result<DocumentVersion> {
        let index = self
            .versions
            .iter()
            .position(|v| &v.id == id)
            .ok_or_else(|| CasegenError::not_found("version", id.as_str()))?;
        let removed = self.versions.remove(index);
        self.unsaved.remove(id);

        if self.active_id.as_ref() == Some(id) {
            self.activate_latest();
        }
        Ok(removed)
    }

    /// Records that the backend stored the version's current content.
    pub fn mark_saved(&mut self, id: &VersionId) {
        self.unsaved.remove(id);
    }

    /// Merges the backend's view into the history.
    ///
    /// Versions already known keep their sequence number and position and
    /// take the backend's content, unless they have unsaved local changes.
    /// Unknown records are numbered after the existing versions in timestamp
    /// order. Known versions the backend no longer lists are dropped, except
    /// unsaved ones. The active pointer survives when its id is still present;
    /// otherwise the newest version becomes active.
    pub fn merge_records(&mut self, mut records: Vec<HistoryRecord>) {
        records.sort_by_key(|r| r.timestamp);

        let mut known: HashMap<VersionId, DocumentVersion> = std::mem::take(&mut self.versions)
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();
        let mut versions = Vec::with_capacity(records.len() + self.unsaved.len());

        for record in records {
            if let Some(mut version) = known.remove(&record.id) {
                if !self.unsaved.contains(&version.id) {
                    version.content = record.content;
                    version.updated_at = record.timestamp;
                    version.origin = record.origin;
                }
                versions.push(version);
                continue;
            }
            if versions.iter().any(|v: &DocumentVersion| v.id == record.id) {
                continue;
            }

            let sequence_number = record
                .version_number
                .filter(|n| *n > self.last_sequence)
                .unwrap_or(self.last_sequence + 1);
            self.last_sequence = sequence_number;
            versions.push(DocumentVersion {
                id: record.id,
                requirement: self.requirement.clone(),
                content: record.content,
                created_at: record.timestamp,
                updated_at: record.timestamp,
                origin: record.origin,
                sequence_number,
            });
        }

        for (id, version) in known {
            if self.unsaved.contains(&id) {
                versions.push(version);
            } else {
                tracing::debug!(
                    "[VersionHistory] {} dropped {} (no longer stored)",
                    self.requirement,
                    id
                );
            }
        }
        versions.sort_by_key(|v| v.sequence_number);
        self.versions = versions;

        if let Some(active) = self.active_id.take() {
            if self.contains(&active) {
                self.active_id = Some(active);
            } else {
                self.activate_latest();
            }
        }
    }

    /// Last update timestamp of the active version.
    pub fn active_updated_at(&self) -> Option<DateTime<Utc>> {
        self.active().map(|v| v.updated_at)
    }

    fn insert(&mut self, draft: VersionDraft) -> VersionId {
        self.last_sequence += 1;
        let id = VersionId::generate();
        self.unsaved.insert(id.clone());
        self.versions.push(DocumentVersion {
            id: id.clone(),
            requirement: self.requirement.clone(),
            content: draft.content,
            created_at: draft.issued_at,
            updated_at: draft.issued_at,
            origin: draft.origin,
            sequence_number: self.last_sequence,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionOrigin;
    use chrono::{Duration, TimeZone};

    fn requirement() -> RequirementRef {
        RequirementRef::new("proj-1", "req-1")
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn draft(content: &str, seconds: i64) -> VersionDraft {
        VersionDraft::new(content, VersionOrigin::Generated, at(seconds))
    }

    fn active_count(history: &VersionHistory) -> usize {
        history
            .versions()
            .iter()
            .filter(|v| history.is_active(v.id()))
            .count()
    }

    #[test]
    fn test_append_assigns_sequence_and_activates() {
        let mut history = VersionHistory::new(requirement());

        let first = history.append(draft("A", 0));
        let second = history.append(draft("B", 1));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(&first).unwrap().sequence_number(), 1);
        assert_eq!(history.get(&second).unwrap().sequence_number(), 2);
        assert_eq!(history.active_id(), Some(&second));
        assert_eq!(active_count(&history), 1);
    }

    #[test]
    fn test_set_active_unknown_id_is_not_found() {
        let mut history = VersionHistory::new(requirement());
        let id = history.append(draft("A", 0));

        let err = history.set_active(&VersionId::from("missing")).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(history.active_id(), Some(&id));
    }

    #[test]
    fn test_set_active_keeps_storage_order() {
        let mut history = VersionHistory::new(requirement());
        let first = history.append(draft("A", 0));
        let second = history.append(draft("B", 1));

        history.set_active(&first).unwrap();

        assert_eq!(history.active().unwrap().content(), "A");
        assert_eq!(history.versions()[0].id(), &first);
        assert_eq!(history.versions()[1].id(), &second);
    }

    #[test]
    fn test_reconcile_on_empty_history_appends() {
        let mut history = VersionHistory::new(requirement());

        let outcome = history.reconcile(LocalEdit::new("x", VersionOrigin::ManualEdit, at(0)), None);

        let ReconcileOutcome::Appended(id) = outcome else {
            panic!("expected append, got {outcome:?}");
        };
        let version = history.get(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(version.content(), "x");
        assert_eq!(version.sequence_number(), 1);
        assert!(history.is_active(&id));
    }

    #[test]
    fn test_reconcile_updates_active_in_place() {
        let mut history = VersionHistory::new(requirement());
        let id = history.append(draft("A", 0));

        let outcome = history.reconcile(LocalEdit::new("B", VersionOrigin::ManualEdit, at(5)), None);

        assert_eq!(outcome, ReconcileOutcome::Updated(id.clone()));
        let version = history.get(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(version.content(), "B");
        assert_eq!(version.sequence_number(), 1);
        assert_eq!(version.origin(), VersionOrigin::ManualEdit);
        assert_eq!(version.updated_at(), at(5));
        assert_eq!(version.created_at(), at(0));
    }

    #[test]
    fn test_reconcile_prefers_hint_and_activates_it() {
        let mut history = VersionHistory::new(requirement());
        let first = history.append(draft("A", 0));
        let second = history.append(draft("B", 1));

        let outcome = history.reconcile(
            LocalEdit::new("A2", VersionOrigin::AgentEdit, at(2)),
            Some(&first),
        );

        assert_eq!(outcome, ReconcileOutcome::Updated(first.clone()));
        assert!(history.is_active(&first));
        assert_eq!(history.get(&second).unwrap().content(), "B");
        assert_eq!(active_count(&history), 1);
    }

    #[test]
    fn test_reconcile_with_unknown_hint_uses_active() {
        let mut history = VersionHistory::new(requirement());
        let id = history.append(draft("A", 0));

        let outcome = history.reconcile(
            LocalEdit::new("B", VersionOrigin::AgentEdit, at(1)),
            Some(&VersionId::from("gone")),
        );

        assert_eq!(outcome, ReconcileOutcome::Updated(id));
    }

    #[test]
    fn test_stale_completion_does_not_clobber_newer_edit() {
        let mut history = VersionHistory::new(requirement());
        let edited = history.append(draft("A", 0));
        history.reconcile(LocalEdit::new("edited", VersionOrigin::ManualEdit, at(10)), None);

        // Generation issued at t=5, before the edit at t=10.
        let activation = history.append_completed(draft("regenerated", 5));

        assert!(!activation.is_activated());
        assert_eq!(history.len(), 2);
        assert!(history.is_active(&edited));
        assert_eq!(history.active().unwrap().content(), "edited");
    }

    #[test]
    fn test_fresh_completion_takes_over() {
        let mut history = VersionHistory::new(requirement());
        history.append(draft("A", 0));

        let activation = history.append_completed(draft("B", 3));

        assert!(activation.is_activated());
        assert!(history.is_active(activation.version_id()));
    }

    #[test]
    fn test_completion_on_untouched_history_activates() {
        let records = vec![HistoryRecord {
            id: VersionId::from("server-1"),
            content: "old".into(),
            timestamp: at(100),
            origin: VersionOrigin::Generated,
            version_number: Some(1),
            requirement_title: None,
        }];
        let mut history = VersionHistory::from_records(requirement(), records);
        assert!(history.active_id().is_none());

        let activation = history.append_completed(draft("new", 0));

        assert!(activation.is_activated());
        assert_eq!(history.get(activation.version_id()).unwrap().sequence_number(), 2);
    }

    #[test]
    fn test_confirm_id_rekeys_active_version() {
        let mut history = VersionHistory::new(requirement());
        let local = history.append(draft("A", 0));

        history.confirm_id(&local, VersionId::from("server-9")).unwrap();

        assert!(!history.contains(&local));
        assert_eq!(history.active_id(), Some(&VersionId::from("server-9")));
    }

    #[test]
    fn test_remove_active_falls_back_to_latest() {
        let mut history = VersionHistory::new(requirement());
        let first = history.append(draft("A", 0));
        let second = history.append(draft("B", 1));

        history.remove(&second).unwrap();

        assert_eq!(history.active_id(), Some(&first));
        history.remove(&first).unwrap();
        assert!(history.active_id().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn test_merge_records_orders_by_timestamp_and_keeps_active() {
        let mut history = VersionHistory::new(requirement());
        history.merge_records(vec![
            HistoryRecord {
                id: VersionId::from("b"),
                content: "second".into(),
                timestamp: at(20),
                origin: VersionOrigin::ManualEdit,
                version_number: None,
                requirement_title: None,
            },
            HistoryRecord {
                id: VersionId::from("a"),
                content: "first".into(),
                timestamp: at(10),
                origin: VersionOrigin::Generated,
                version_number: None,
                requirement_title: None,
            },
        ]);
        history.set_active(&VersionId::from("a")).unwrap();

        history.merge_records(vec![
            HistoryRecord {
                id: VersionId::from("a"),
                content: "first, refreshed".into(),
                timestamp: at(10),
                origin: VersionOrigin::Generated,
                version_number: None,
                requirement_title: None,
            },
            HistoryRecord {
                id: VersionId::from("b"),
                content: "second".into(),
                timestamp: at(20),
                origin: VersionOrigin::ManualEdit,
                version_number: None,
                requirement_title: None,
            },
        ]);

        assert_eq!(history.versions()[0].id().as_str(), "a");
        assert_eq!(history.versions()[0].sequence_number(), 1);
        assert_eq!(history.versions()[1].sequence_number(), 2);
        assert_eq!(history.active().unwrap().content(), "first, refreshed");
    }

    fn record(id: &str, content: &str, seconds: i64) -> HistoryRecord {
        HistoryRecord {
            id: VersionId::from(id),
            content: content.into(),
            timestamp: at(seconds),
            origin: VersionOrigin::Generated,
            version_number: None,
            requirement_title: None,
        }
    }

    #[test]
    fn test_merge_keeps_sequence_of_version_edited_in_place() {
        let mut history = VersionHistory::from_records(
            requirement(),
            vec![record("a", "A", 10), record("b", "B", 20)],
        );
        history.set_active(&VersionId::from("a")).unwrap();

        // The backend stamps an updated record with the edit time.
        history.merge_records(vec![record("b", "B", 20), record("a", "A2", 30), record("c", "C", 40)]);

        let order: Vec<(&str, u64)> = history
            .versions()
            .iter()
            .map(|v| (v.id().as_str(), v.sequence_number()))
            .collect();
        assert_eq!(order, vec![("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(history.active().unwrap().content(), "A2");
        assert_eq!(history.active().unwrap().updated_at(), at(30));
        assert_eq!(history.active().unwrap().created_at(), at(10));
    }

    #[test]
    fn test_merge_keeps_unsaved_versions() {
        let mut history = VersionHistory::from_records(requirement(), vec![record("a", "A", 10)]);
        history.set_active(&VersionId::from("a")).unwrap();
        history.reconcile(LocalEdit::new("A local", VersionOrigin::ManualEdit, at(50)), None);
        let local = history.append(draft("never stored", 60));

        history.merge_records(vec![record("a", "A", 10)]);

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(&VersionId::from("a")).unwrap().content(), "A local");
        assert!(history.is_unsaved(&local));
        assert_eq!(history.active_id(), Some(&local));

        history.mark_saved(&VersionId::from("a"));
        history.merge_records(vec![record("a", "A", 10)]);
        assert_eq!(history.get(&VersionId::from("a")).unwrap().content(), "A");
    }

    #[test]
    fn test_merge_drops_saved_versions_missing_from_backend() {
        let mut history = VersionHistory::new(requirement());
        let local = history.append(draft("A", 0));
        history.confirm_id(&local, VersionId::from("server-1")).unwrap();
        assert!(!history.is_unsaved(&VersionId::from("server-1")));

        history.merge_records(vec![record("server-2", "B", 5)]);

        assert_eq!(history.len(), 1);
        assert_eq!(history.active().unwrap().content(), "B");
        assert_eq!(history.active().unwrap().sequence_number(), 2);
    }

    #[test]
    fn test_activate_latest() {
        let mut history = VersionHistory::from_records(
            requirement(),
            vec![record("a", "A", 10), record("b", "B", 20)],
        );
        assert!(history.active_id().is_none());

        assert_eq!(history.activate_latest(), Some(VersionId::from("b")));
        assert!(history.is_active(&VersionId::from("b")));
        assert_eq!(VersionHistory::new(requirement()).activate_latest(), None);
    }

    #[test]
    fn test_at_most_one_active_across_mixed_operations() {
        let mut history = VersionHistory::new(requirement());
        let mut last_effective = None;

        for step in 0..24i64 {
            let id = match step % 4 {
                0 => history.append(draft(&format!("gen {step}"), step)),
                1 => history
                    .reconcile(
                        LocalEdit::new(format!("edit {step}"), VersionOrigin::ManualEdit, at(step)),
                        None,
                    )
                    .version_id()
                    .clone(),
                2 => {
                    let activation = history.append_completed(draft("late", step - 3));
                    if activation.is_activated() {
                        activation.version_id().clone()
                    } else {
                        last_effective.clone().unwrap()
                    }
                }
                _ => history
                    .reconcile(
                        LocalEdit::new("agent", VersionOrigin::AgentEdit, at(step)),
                        history.versions().first().map(|v| v.id().clone()).as_ref(),
                    )
                    .version_id()
                    .clone(),
            };
            last_effective = Some(id);

            assert_eq!(active_count(&history), 1);
            assert_eq!(history.active_id(), last_effective.as_ref());
        }

        let sequences: Vec<u64> = history.versions().iter().map(|v| v.sequence_number()).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}
