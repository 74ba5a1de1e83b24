//! In-process transport fed through channels.
//!
//! Each call to `open` takes the next queued stream. Streams are fed by a
//! `StreamFeeder`, either ahead of time (`push_frames`) or while the session
//! is already consuming them (`push_stream`). Used for offline replay and by
//! the test suites of the outer crates.

use async_trait::async_trait;
use casegen_core::error::{CasegenError, Result};
use casegen_core::frame::{DONE_SENTINEL, StreamFrame};
use casegen_core::generation::{FragmentStream, OutboundRequest, StreamTransport};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

type Fragment = Result<Vec<u8>>;

/// Feeds fragments into a queued stream. Dropping the feeder ends the stream.
#[derive(Debug, Clone)]
pub struct StreamFeeder {
    tx: mpsc::UnboundedSender<Fragment>,
}

impl StreamFeeder {
    /// Sends raw bytes. Returns false once the consumer has gone away.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.tx.send(Ok(bytes.into())).is_ok()
    }

    /// Sends one frame in wire format.
    pub fn send_frame(&self, frame: &StreamFrame) -> bool {
        self.send(encode_frame(frame))
    }

    /// Makes the stream yield a transport failure.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(Err(CasegenError::transport(message))).is_ok()
    }
}

/// Transport whose responses are supplied by the caller.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Fragment>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an open-ended stream for the next request.
    pub fn push_stream(&self) -> StreamFeeder {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_streams().push_back(rx);
        StreamFeeder { tx }
    }

    /// Queues a complete, already closed response.
    pub fn push_frames(&self, frames: impl IntoIterator<Item = StreamFrame>) {
        let feeder = self.push_stream();
        for frame in frames {
            feeder.send_frame(&frame);
        }
    }

    /// Every request opened so far, in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_streams(&self) -> std::sync::MutexGuard<'_, VecDeque<mpsc::UnboundedReceiver<Fragment>>> {
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    async fn open(&self, request: &OutboundRequest) -> Result<FragmentStream> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let rx = self.lock_streams().pop_front().ok_or_else(|| {
            CasegenError::transport(format!("no response queued for {}", request.endpoint()))
        })?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|fragment| (fragment, rx))
        });
        Ok(stream.boxed())
    }
}

/// Encodes a frame the way the producer puts it on the wire.
pub fn encode_frame(frame: &StreamFrame) -> String {
    let payload = match frame {
        StreamFrame::TextChunk { text } => serde_json::json!({ "chunk": text }).to_string(),
        StreamFrame::Directive {
            updated_document,
            note,
        } => serde_json::json!({
            "updated_test_cases": updated_document,
            "confirmation": note,
        })
        .to_string(),
        StreamFrame::ErrorFrame { message } => serde_json::json!({ "error": message }).to_string(),
        StreamFrame::End => DONE_SENTINEL.to_string(),
    };
    format!("data: {payload}\n\n")
}
