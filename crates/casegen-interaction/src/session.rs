//! Generation session: one in-flight generation or conversational exchange.
//!
//! A session opens a frame stream through a `StreamTransport`, feeds the
//! fragments to its own `FrameDecoder` and hands out `SessionEvent`s one at a
//! time. The consumer pulls events with `next_event`, so it can await its own
//! side effects (history writes) between frames.

use crate::decoder::FrameDecoder;
use casegen_core::error::{CasegenError, Result};
use casegen_core::frame::StreamFrame;
use casegen_core::generation::{FragmentStream, OutboundRequest, StreamTransport};
use futures::StreamExt;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Something the consumer of a session has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Streamed text, already appended to the accumulated text.
    Chunk(String),
    /// Replacement document proposed by the producer.
    Directive {
        updated_document: String,
        note: Option<String>,
    },
    /// The producer finished normally.
    Completed,
    /// The session failed; emitted exactly once.
    Failed(CasegenError),
    /// The session was cancelled.
    Cancelled,
}

/// Cancels a session from outside the task that drives it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    token: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cancellation. The session stops at its next suspension point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// State machine for a single exchange with the producer.
///
/// Terminal states are final; further work needs a new session.
pub struct GenerationSession {
    id: Uuid,
    state: SessionState,
    accumulated_text: String,
    directive_received: bool,
    /// Only conversations carry directives; generation streams ignore them.
    accepts_directives: bool,
    token: CancellationToken,
    decoder: FrameDecoder,
    stream: Option<FragmentStream>,
    pending: VecDeque<StreamFrame>,
    error: Option<CasegenError>,
    terminal_emitted: bool,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            accumulated_text: String::new(),
            directive_received: false,
            accepts_directives: false,
            token: CancellationToken::new(),
            decoder: FrameDecoder::new(),
            stream: None,
            pending: VecDeque::new(),
            error: None,
            terminal_emitted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Text of every chunk received before a directive, in order.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn abort_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn directive_received(&self) -> bool {
        self.directive_received
    }

    /// The failure that ended the session, if it failed.
    pub fn error(&self) -> Option<&CasegenError> {
        self.error.as_ref()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            token: self.token.clone(),
        }
    }

    /// Issues the outbound request.
    ///
    /// Failures to open the stream do not return an error; they move the
    /// session to `Failed` and are reported by `next_event`. Only calling
    /// `start` outside `Idle` is an error.
    pub async fn start(&mut self, transport: &dyn StreamTransport, request: &OutboundRequest) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(CasegenError::InvalidState(format!(
                "session {} cannot start from {:?}",
                self.id, self.state
            )));
        }
        if self.token.is_cancelled() {
            self.enter_cancelled();
            return Ok(());
        }

        self.state = SessionState::Requesting;
        self.accepts_directives = matches!(request, OutboundRequest::Converse(_));
        tracing::debug!(
            "[GenerationSession] {} requesting {}",
            self.id,
            request.endpoint()
        );

        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            opened = transport.open(request) => Some(opened),
        };

        match opened {
            None => self.enter_cancelled(),
            Some(Ok(stream)) => self.stream = Some(stream),
            Some(Err(err)) => self.fail(into_transport_error(err)),
        }
        Ok(())
    }

    /// Requests cancellation and stops the session immediately.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.token.cancel();
        self.enter_cancelled();
    }

    /// Waits for the next event.
    ///
    /// Returns `None` before `start` and after the terminal event was handed out.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.state.is_terminal() {
                return self.take_terminal_event();
            }
            if self.token.is_cancelled() {
                self.enter_cancelled();
                continue;
            }
            if let Some(frame) = self.pending.pop_front() {
                if let Some(event) = self.apply(frame) {
                    return Some(event);
                }
                continue;
            }
            if self.state == SessionState::Idle {
                return None;
            }

            let token = &self.token;
            let Some(stream) = self.stream.as_mut() else {
                self.fail(CasegenError::transport(
                    "stream closed before the end marker",
                ));
                continue;
            };

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = next else {
                self.enter_cancelled();
                continue;
            };

            match item {
                Some(Ok(fragment)) => {
                    if self.state == SessionState::Requesting {
                        tracing::debug!("[GenerationSession] {} streaming", self.id);
                        self.state = SessionState::Streaming;
                    }
                    self.pending.extend(self.decoder.feed(&fragment));
                }
                Some(Err(err)) => self.fail(into_transport_error(err)),
                None => {
                    self.stream = None;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }

    fn apply(&mut self, frame: StreamFrame) -> Option<SessionEvent> {
        if self.token.is_cancelled() {
            self.enter_cancelled();
            return None;
        }

        match frame {
            StreamFrame::TextChunk { text } => {
                if self.directive_received {
                    tracing::debug!(
                        "[GenerationSession] {} ignoring chunk after directive",
                        self.id
                    );
                    return None;
                }
                self.accumulated_text.push_str(&text);
                Some(SessionEvent::Chunk(text))
            }
            StreamFrame::Directive {
                updated_document,
                note,
            } => {
                if !self.accepts_directives {
                    tracing::warn!(
                        "[GenerationSession] {} ignoring directive in generation stream",
                        self.id
                    );
                    return None;
                }
                if self.directive_received {
                    tracing::warn!(
                        "[GenerationSession] {} ignoring additional directive",
                        self.id
                    );
                    return None;
                }
                self.directive_received = true;
                Some(SessionEvent::Directive {
                    updated_document,
                    note,
                })
            }
            StreamFrame::ErrorFrame { message } => {
                self.fail(CasegenError::producer(message));
                None
            }
            StreamFrame::End => {
                tracing::debug!(
                    "[GenerationSession] {} completed ({} chars)",
                    self.id,
                    self.accumulated_text.len()
                );
                self.state = SessionState::Completed;
                self.stream = None;
                None
            }
        }
    }

    fn fail(&mut self, error: CasegenError) {
        tracing::warn!("[GenerationSession] {} failed: {}", self.id, error);
        self.state = SessionState::Failed;
        self.error = Some(error);
        self.stream = None;
        self.pending.clear();
    }

    fn enter_cancelled(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!("[GenerationSession] {} cancelled", self.id);
        self.token.cancel();
        self.state = SessionState::Cancelled;
        // Dropping the stream closes the transport.
        self.stream = None;
        self.pending.clear();
    }

    fn take_terminal_event(&mut self) -> Option<SessionEvent> {
        if self.terminal_emitted {
            return None;
        }
        self.terminal_emitted = true;
        match self.state {
            SessionState::Completed => Some(SessionEvent::Completed),
            SessionState::Cancelled => Some(SessionEvent::Cancelled),
            SessionState::Failed => Some(SessionEvent::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| CasegenError::internal("session failed without an error")),
            )),
            _ => None,
        }
    }
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

fn into_transport_error(err: CasegenError) -> CasegenError {
    match err {
        CasegenError::Transport(_) | CasegenError::Producer(_) => err,
        other => CasegenError::transport(other.to_string()),
    }
}
