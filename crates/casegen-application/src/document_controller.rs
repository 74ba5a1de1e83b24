//! Document controller implementation.
//!
//! This module provides the `DocumentController` which drives generation
//! sessions and conversational edits for one requirement and keeps the
//! requirement's version history consistent with the history backend.

use casegen_core::chat::{ChatExchange, ChatMessage};
use casegen_core::error::{CasegenError, Result};
use casegen_core::generation::{
    ConversationBody, DocumentEvent, DocumentNotice, ExchangeId, ExchangeKind, FormatOptions,
    GenerationBody, GenerationPrompt, OutboundRequest, StreamTransport,
};
use casegen_core::requirement::{RequirementDetails, RequirementRef};
use casegen_core::version::{
    DocumentVersion, HistoryRecord, HistoryRepository, LocalEdit, ReconcileOutcome, RecordContext,
    VersionDraft, VersionHistory, VersionId, VersionOrigin,
};
use casegen_interaction::{GenerationSession, SessionEvent, SessionHandle};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};

/// Assistant message recorded after a directive when the producer sent no note.
pub const DEFAULT_CONFIRMATION: &str = "Modifications appliquées.";

/// How a streamed exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The stream reached its end marker. Carries the version the exchange
    /// wrote, if any.
    Completed(Option<VersionId>),
    /// The exchange was cancelled, by the caller or by a newer exchange.
    Cancelled,
    /// The exchange failed. The error was also reported as an `Error` event.
    Failed(CasegenError),
}

struct ActiveSession {
    handle: SessionHandle,
    kind: ExchangeKind,
}

/// Orchestrates generation sessions and the version history of one requirement.
///
/// # Responsibilities
///
/// - Running generations and committing their result as a new version
/// - Writing manual and conversational edits over the active version
/// - Persisting every change through the `HistoryRepository`
/// - Reporting progress as `DocumentNotice`s tagged with the exchange id
///
/// # Concurrency
///
/// At most one session is in flight. `generate` is rejected while one runs;
/// `converse` cancels it instead. History mutations and their persistence are
/// serialized, so an edit never races the backend write of a generation.
pub struct DocumentController {
    requirement: RequirementRef,
    details: RequirementDetails,
    transport: Arc<dyn StreamTransport>,
    repository: Arc<dyn HistoryRepository>,
    events: mpsc::UnboundedSender<DocumentNotice>,
    /// Loaded lazily from the repository on first use.
    history: RwLock<Option<VersionHistory>>,
    chat: Mutex<ChatExchange>,
    active_session: Mutex<Option<ActiveSession>>,
    writes: Mutex<()>,
}

impl DocumentController {
    /// Creates a controller.
    ///
    /// # Arguments
    ///
    /// * `requirement` - The requirement whose document this controller owns
    /// * `details` - Title and description sent with requests and stored with versions
    /// * `transport` - Carries generation and conversation streams
    /// * `repository` - History backend
    /// * `events` - Receives progress events; a dropped receiver is tolerated
    pub fn new(
        requirement: RequirementRef,
        details: RequirementDetails,
        transport: Arc<dyn StreamTransport>,
        repository: Arc<dyn HistoryRepository>,
        events: mpsc::UnboundedSender<DocumentNotice>,
    ) -> Self {
        Self {
            requirement,
            details,
            transport,
            repository,
            events,
            history: RwLock::new(None),
            chat: Mutex::new(ChatExchange::new()),
            active_session: Mutex::new(None),
            writes: Mutex::new(()),
        }
    }

    pub fn requirement(&self) -> &RequirementRef {
        &self.requirement
    }

    pub fn details(&self) -> &RequirementDetails {
        &self.details
    }

    // ============================================================================
    // Streamed exchanges
    // ============================================================================

    /// Generates a new document version.
    ///
    /// Validation and `SessionBusy` errors are returned before any request is
    /// issued. Everything after that is reported through events and the
    /// returned `ExchangeOutcome`.
    pub async fn generate(
        &self,
        prompt: GenerationPrompt,
        format: FormatOptions,
    ) -> Result<ExchangeOutcome> {
        prompt.validate()?;
        format.validate()?;
        self.ensure_loaded().await;

        let mut session = GenerationSession::new();
        {
            let mut slot = self.active_session.lock().await;
            if slot.is_some() {
                return Err(CasegenError::SessionBusy(self.requirement.to_string()));
            }
            *slot = Some(ActiveSession {
                handle: session.handle(),
                kind: ExchangeKind::Generation,
            });
        }

        let request = OutboundRequest::Generate(GenerationBody {
            requirements: prompt.requirements,
            format_type: format.kind,
            context: prompt.context,
            example_case: format.example,
            project_id: self.requirement.project_id.clone(),
        });

        let outcome = self.run_generation(&mut session, &request).await;
        self.release_session(&session.handle()).await;
        outcome
    }

    async fn run_generation(
        &self,
        session: &mut GenerationSession,
        request: &OutboundRequest,
    ) -> Result<ExchangeOutcome> {
        let kind = ExchangeKind::Generation;
        let exchange = session.id();
        let issued_at = Utc::now();

        tracing::info!(
            "[DocumentController] {} generation {} started",
            self.requirement,
            exchange
        );
        self.emit(Some(exchange), DocumentEvent::Started { kind });
        session.start(self.transport.as_ref(), request).await?;

        while let Some(event) = session.next_event().await {
            match event {
                SessionEvent::Chunk(text) => {
                    self.emit(Some(exchange), DocumentEvent::ChunkReceived { kind, text })
                }
                SessionEvent::Directive { .. } => {
                    tracing::debug!(
                        "[DocumentController] {} ignoring directive in generation stream",
                        self.requirement
                    );
                }
                SessionEvent::Completed => {
                    let content = session.accumulated_text().to_string();
                    if content.trim().is_empty() {
                        return Ok(self.fail_exchange(
                            exchange,
                            kind,
                            CasegenError::producer("The generation service returned no test cases"),
                        ));
                    }
                    let id = self.commit_generation(exchange, content, issued_at).await;
                    self.emit(Some(exchange), DocumentEvent::Done { kind });
                    return Ok(ExchangeOutcome::Completed(Some(id)));
                }
                SessionEvent::Failed(err) => return Ok(self.fail_exchange(exchange, kind, err)),
                SessionEvent::Cancelled => {
                    self.emit(Some(exchange), DocumentEvent::Cancelled { kind });
                    return Ok(ExchangeOutcome::Cancelled);
                }
            }
        }

        Err(CasegenError::internal("generation session ended without a terminal event"))
    }

    /// Sends a message to the conversational agent.
    ///
    /// Any exchange still in flight is cancelled first. A directive in the
    /// reply is written over the version that was active when the message was
    /// sent, as soon as it arrives.
    pub async fn converse(
        &self,
        message: impl Into<String>,
        direct_mode: bool,
    ) -> Result<ExchangeOutcome> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(CasegenError::validation("Message cannot be empty"));
        }
        self.ensure_loaded().await;

        let mut session = GenerationSession::new();
        let owner = session.id();
        {
            let mut slot = self.active_session.lock().await;
            if let Some(previous) = slot.take() {
                tracing::info!(
                    "[DocumentController] {} superseding {:?} session {}",
                    self.requirement,
                    previous.kind,
                    previous.handle.id()
                );
                previous.handle.cancel();
            }
            *slot = Some(ActiveSession {
                handle: session.handle(),
                kind: ExchangeKind::Conversation,
            });
        }

        let (active_hint, document) = {
            let guard = self.history.read().await;
            let active = guard.as_ref().and_then(VersionHistory::active);
            (
                active.map(|v| v.id().clone()),
                active.map(|v| v.content().to_string()).unwrap_or_default(),
            )
        };

        let chat_history = {
            let mut chat = self.chat.lock().await;
            let previous = chat.completed_messages();
            chat.push_user(message.clone());
            chat.begin_reply(owner);
            previous
        };

        let request = OutboundRequest::Converse(ConversationBody {
            message,
            project_id: self.requirement.project_id.clone(),
            test_cases: document,
            requirement_id: self.requirement.requirement_id.clone(),
            requirement_title: self.details.title.clone(),
            requirements: self.details.description.clone(),
            chat_history,
            direct_mode,
            active_history_id: active_hint.as_ref().map(|id| id.to_string()),
        });

        let outcome = self
            .run_conversation(&mut session, &request, active_hint)
            .await;
        self.release_session(&session.handle()).await;
        outcome
    }

    async fn run_conversation(
        &self,
        session: &mut GenerationSession,
        request: &OutboundRequest,
        active_hint: Option<VersionId>,
    ) -> Result<ExchangeOutcome> {
        let kind = ExchangeKind::Conversation;
        let owner = session.id();
        let mut committed = None;

        tracing::info!(
            "[DocumentController] {} conversation {} started",
            self.requirement,
            owner
        );
        self.emit(Some(owner), DocumentEvent::Started { kind });
        session.start(self.transport.as_ref(), request).await?;

        while let Some(event) = session.next_event().await {
            match event {
                SessionEvent::Chunk(text) => {
                    self.chat.lock().await.append_reply(owner, &text);
                    self.emit(Some(owner), DocumentEvent::ChunkReceived { kind, text });
                }
                SessionEvent::Directive {
                    updated_document,
                    note,
                } => {
                    let id = self
                        .commit_edit(
                            Some(owner),
                            updated_document,
                            VersionOrigin::AgentEdit,
                            active_hint.as_ref(),
                        )
                        .await;
                    committed = Some(id);
                    let note = note.unwrap_or_else(|| DEFAULT_CONFIRMATION.to_string());
                    self.chat.lock().await.push_assistant(owner, note);
                }
                SessionEvent::Completed => {
                    self.chat.lock().await.finish_reply(owner);
                    self.emit(Some(owner), DocumentEvent::Done { kind });
                    return Ok(ExchangeOutcome::Completed(committed));
                }
                SessionEvent::Failed(err) => {
                    {
                        let mut chat = self.chat.lock().await;
                        chat.discard_reply(owner);
                        chat.push_assistant(owner, format!("Error: {}", err.user_message()));
                    }
                    return Ok(self.fail_exchange(owner, kind, err));
                }
                SessionEvent::Cancelled => {
                    self.chat.lock().await.discard_reply(owner);
                    self.emit(Some(owner), DocumentEvent::Cancelled { kind });
                    return Ok(ExchangeOutcome::Cancelled);
                }
            }
        }

        Err(CasegenError::internal("conversation session ended without a terminal event"))
    }

    /// Cancels the session in flight. Returns false when there is none.
    pub async fn cancel_active(&self) -> bool {
        let slot = self.active_session.lock().await;
        match slot.as_ref() {
            Some(active) => {
                tracing::info!(
                    "[DocumentController] {} cancelling {:?} session {}",
                    self.requirement,
                    active.kind,
                    active.handle.id()
                );
                active.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns true while a session is in flight.
    pub async fn is_busy(&self) -> bool {
        self.active_session.lock().await.is_some()
    }

    // ============================================================================
    // Direct history operations
    // ============================================================================

    /// Writes hand-edited content over the active version.
    ///
    /// With no active version the edit becomes the first version instead.
    pub async fn edit_in_place(&self, content: impl Into<String>) -> Result<VersionId> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(CasegenError::validation("Test cases cannot be empty"));
        }
        self.ensure_loaded().await;
        Ok(self
            .commit_edit(None, content, VersionOrigin::ManualEdit, None)
            .await)
    }

    /// Makes another version the active one.
    pub async fn set_active(&self, id: &VersionId) -> Result<()> {
        self.ensure_loaded().await;
        self.with_history(|history| history.set_active(id)).await?;
        self.emit_replaced(None, id).await;
        Ok(())
    }

    /// Deletes a version from the backend and from the local history.
    ///
    /// A version the backend never stored is removed locally only.
    pub async fn delete_version(&self, id: &VersionId) -> Result<()> {
        self.ensure_loaded().await;
        let _writes = self.writes.lock().await;

        let was_active = {
            let guard = self.history.read().await;
            let history = guard
                .as_ref()
                .filter(|h| h.contains(id))
                .ok_or_else(|| CasegenError::not_found("version", id.as_str()))?;
            history.is_active(id)
        };

        match self.repository.delete(id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    "[DocumentController] {} version {} unknown to backend, removing locally",
                    self.requirement,
                    id
                );
            }
            Err(err) => return Err(err),
        }

        let new_active = self
            .with_history(|history| {
                history
                    .remove(id)
                    .map(|_| history.active_id().cloned())
            })
            .await?;

        tracing::info!("[DocumentController] {} deleted version {}", self.requirement, id);
        if was_active && let Some(active) = new_active {
            self.emit_replaced(None, &active).await;
        }
        Ok(())
    }

    /// Reloads the history from the backend, keeping the active version when
    /// it still exists.
    pub async fn refresh(&self) -> Result<()> {
        let records = self.repository.list(&self.requirement).await?;
        let _writes = self.writes.lock().await;
        let mut guard = self.history.write().await;
        let history = match guard.take() {
            Some(mut history) => {
                history.merge_records(records);
                history
            }
            None => self.initial_history(records),
        };
        tracing::debug!(
            "[DocumentController] {} refreshed ({} versions)",
            self.requirement,
            history.len()
        );
        *guard = Some(history);
        Ok(())
    }

    // ============================================================================
    // Snapshots
    // ============================================================================

    /// Returns a copy of the version history, loading it if needed.
    pub async fn history(&self) -> VersionHistory {
        self.ensure_loaded().await;
        self.with_history(|history| history.clone()).await
    }

    /// Returns the active version, loading the history if needed.
    pub async fn active_document(&self) -> Option<DocumentVersion> {
        self.ensure_loaded().await;
        self.with_history(|history| history.active().cloned()).await
    }

    /// Returns the chat transcript, including a reply still being streamed.
    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.chat.lock().await.messages().to_vec()
    }

    // ============================================================================
    // Internals
    // ============================================================================

    /// Loads the history on first use. A backend failure leaves an empty
    /// history so work can continue offline; `refresh` reports the failure.
    async fn ensure_loaded(&self) {
        if self.history.read().await.is_some() {
            return;
        }

        let records = match self.repository.list(&self.requirement).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    "[DocumentController] {} failed to load history: {}",
                    self.requirement,
                    err
                );
                Vec::new()
            }
        };

        let mut guard = self.history.write().await;
        if guard.is_none() {
            *guard = Some(self.initial_history(records));
        }
    }

    /// The newest stored version is active after the first load.
    fn initial_history(&self, records: Vec<HistoryRecord>) -> VersionHistory {
        let mut history = VersionHistory::from_records(self.requirement.clone(), records);
        history.activate_latest();
        history
    }

    async fn with_history<R>(&self, f: impl FnOnce(&mut VersionHistory) -> R) -> R {
        let mut guard = self.history.write().await;
        let history =
            guard.get_or_insert_with(|| VersionHistory::new(self.requirement.clone()));
        f(history)
    }

    async fn commit_generation(
        &self,
        exchange: ExchangeId,
        content: String,
        issued_at: DateTime<Utc>,
    ) -> VersionId {
        let _writes = self.writes.lock().await;
        let activation = self
            .with_history(|history| {
                history.append_completed(VersionDraft::new(
                    content,
                    VersionOrigin::Generated,
                    issued_at,
                ))
            })
            .await;

        let id = self
            .persist_created(Some(exchange), activation.version_id().clone())
            .await;
        if activation.is_activated() {
            self.emit_replaced(Some(exchange), &id).await;
        } else {
            tracing::info!(
                "[DocumentController] {} kept stale generation {} inactive",
                self.requirement,
                id
            );
            self.emit(
                Some(exchange),
                DocumentEvent::VersionAppended {
                    version_id: id.clone(),
                },
            );
        }
        id
    }

    async fn commit_edit(
        &self,
        exchange: Option<ExchangeId>,
        content: String,
        origin: VersionOrigin,
        active_hint: Option<&VersionId>,
    ) -> VersionId {
        let _writes = self.writes.lock().await;
        let edit = LocalEdit::new(content, origin, Utc::now());
        let outcome = self
            .with_history(|history| history.reconcile(edit, active_hint))
            .await;

        let id = match outcome {
            ReconcileOutcome::Updated(id) => self.persist_updated(exchange, id).await,
            ReconcileOutcome::Appended(id) => self.persist_created(exchange, id).await,
        };
        self.emit_replaced(exchange, &id).await;
        id
    }

    /// Stores a new version and adopts the id the backend assigned.
    async fn persist_created(&self, exchange: Option<ExchangeId>, local_id: VersionId) -> VersionId {
        let Some(record) = self.record_of(&local_id).await else {
            return local_id;
        };

        match self.repository.create(self.record_context(), &record).await {
            Ok(Some(confirmed)) => {
                let adopted = self
                    .with_history(|history| history.confirm_id(&local_id, confirmed.clone()))
                    .await;
                match adopted {
                    Ok(()) => confirmed,
                    Err(err) => {
                        tracing::warn!(
                            "[DocumentController] {} could not adopt id {}: {}",
                            self.requirement,
                            confirmed,
                            err
                        );
                        local_id
                    }
                }
            }
            Ok(None) => {
                tracing::warn!(
                    "[DocumentController] {} backend stored {} without reporting an id",
                    self.requirement,
                    local_id
                );
                self.with_history(|history| history.mark_saved(&local_id)).await;
                local_id
            }
            Err(err) => {
                self.save_failed(exchange, &err);
                local_id
            }
        }
    }

    /// Updates a version in the backend, creating it when the backend does
    /// not know it.
    async fn persist_updated(&self, exchange: Option<ExchangeId>, id: VersionId) -> VersionId {
        let Some(record) = self.record_of(&id).await else {
            return id;
        };

        match self.repository.update(self.record_context(), &record).await {
            Ok(()) => {
                self.with_history(|history| history.mark_saved(&id)).await;
                id
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    "[DocumentController] {} version {} not in backend, creating it",
                    self.requirement,
                    id
                );
                self.persist_created(exchange, id).await
            }
            Err(err) => {
                self.save_failed(exchange, &err);
                id
            }
        }
    }

    async fn record_of(&self, id: &VersionId) -> Option<HistoryRecord> {
        let guard = self.history.read().await;
        guard
            .as_ref()
            .and_then(|history| history.get(id))
            .map(|version| HistoryRecord::from_version(version, Some(self.details.title.clone())))
    }

    fn record_context(&self) -> RecordContext<'_> {
        RecordContext {
            requirement: &self.requirement,
            details: &self.details,
        }
    }

    async fn release_session(&self, handle: &SessionHandle) {
        let mut slot = self.active_session.lock().await;
        if slot
            .as_ref()
            .is_some_and(|active| active.handle.id() == handle.id())
        {
            *slot = None;
        }
    }

    fn fail_exchange(
        &self,
        exchange: ExchangeId,
        kind: ExchangeKind,
        err: CasegenError,
    ) -> ExchangeOutcome {
        tracing::warn!(
            "[DocumentController] {} {:?} failed: {}",
            self.requirement,
            kind,
            err
        );
        self.emit(
            Some(exchange),
            DocumentEvent::Error {
                kind,
                message: err.user_message(),
            },
        );
        ExchangeOutcome::Failed(err)
    }

    fn save_failed(&self, exchange: Option<ExchangeId>, err: &CasegenError) {
        tracing::error!(
            "[DocumentController] {} failed to save history: {}",
            self.requirement,
            err
        );
        self.emit(
            exchange,
            DocumentEvent::SaveFailed {
                message: err.to_string(),
            },
        );
    }

    async fn emit_replaced(&self, exchange: Option<ExchangeId>, id: &VersionId) {
        let event = {
            let guard = self.history.read().await;
            guard
                .as_ref()
                .and_then(|history| history.get(id))
                .map(|version| DocumentEvent::DocumentReplaced {
                    version_id: version.id().clone(),
                    content: version.content().to_string(),
                    origin: version.origin(),
                })
        };
        if let Some(event) = event {
            self.emit(exchange, event);
        }
    }

    fn emit(&self, exchange_id: Option<ExchangeId>, event: DocumentEvent) {
        let notice = DocumentNotice {
            requirement: self.requirement.clone(),
            exchange_id,
            event,
        };
        if self.events.send(notice).is_err() {
            tracing::trace!("[DocumentController] event receiver dropped");
        }
    }
}
