//! Frame decoder for the `data:` block protocol.
//!
//! The producer answers with UTF-8 blocks separated by a blank line:
//!
//! ```text
//! data: {"chunk": "Scenario (1): "}
//!
//! data: {"updated_test_cases": "...", "confirmation": "Modifications appliquées."}
//!
//! data: [DONE]
//! ```
//!
//! Fragments arrive at arbitrary byte boundaries, so bytes are buffered until
//! a complete block is present; only complete blocks are decoded as UTF-8.

use casegen_core::error::{CasegenError, Result};
use casegen_core::frame::{DONE_SENTINEL, StreamFrame};
use serde::Deserialize;

/// Fields a block payload may carry.
#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    updated_test_cases: Option<String>,
    #[serde(default)]
    confirmation: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Incremental decoder turning byte fragments into `StreamFrame`s.
///
/// Once `End` or an error frame has been produced the decoder is finished and
/// ignores any further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Buffer offset up to which no block delimiter can start.
    scanned: usize,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a terminal frame has been produced or `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one fragment and returns every frame completed by it.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if self.finished {
            if !fragment.is_empty() {
                tracing::debug!(
                    "[FrameDecoder] Ignoring {} bytes after end of stream",
                    fragment.len()
                );
            }
            return frames;
        }

        self.buffer.extend_from_slice(fragment);

        while let Some((end, delimiter_len)) = find_block_end(&self.buffer, self.scanned) {
            let block: Vec<u8> = self.buffer.drain(..end + delimiter_len).take(end).collect();
            self.scanned = 0;

            if let Some(frame) = decode_or_skip(&block) {
                let terminal = frame.is_terminal();
                frames.push(frame);
                if terminal {
                    self.finish_now();
                    return frames;
                }
            }
        }

        // A delimiter may still start in the last two bytes.
        self.scanned = self.buffer.len().saturating_sub(2);
        frames
    }

    /// Signals the end of input and flushes a trailing block that was not
    /// followed by a blank line.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        if self.finished {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        self.finish_now();

        decode_or_skip(&rest).into_iter().collect()
    }

    fn finish_now(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
    }
}

/// Finds the first blank line at or after `from`.
///
/// Returns the block length and the delimiter length. `\n\n` and `\n\r\n`
/// both end a block; a trailing `\r` on the block is trimmed during decoding.
fn find_block_end(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buffer.len() {
        if buffer[i] == b'\n' {
            match buffer[i + 1] {
                b'\n' => return Some((i, 2)),
                b'\r' if buffer.get(i + 2) == Some(&b'\n') => return Some((i, 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Decodes a block, logging and dropping it when it is malformed.
fn decode_or_skip(block: &[u8]) -> Option<StreamFrame> {
    match decode_block(block) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!("[FrameDecoder] Dropping block: {}", err);
            None
        }
    }
}

/// Decodes a single block.
///
/// Blank blocks yield `Ok(None)`; anything that is not a well-formed payload
/// is a protocol error.
fn decode_block(block: &[u8]) -> Result<Option<StreamFrame>> {
    let text = std::str::from_utf8(block)
        .map_err(|err| CasegenError::protocol(format!("block is not UTF-8: {err}")))?;

    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut data_lines = Vec::new();
    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }

    if data_lines.is_empty() {
        return Err(CasegenError::protocol(format!(
            "block without data line: {:?}",
            preview(text)
        )));
    }

    let payload = data_lines.join("\n");
    if payload.trim() == DONE_SENTINEL {
        return Ok(Some(StreamFrame::End));
    }

    let parsed: WirePayload = serde_json::from_str(&payload).map_err(|err| {
        CasegenError::protocol(format!(
            "unparseable payload ({err}): {:?}",
            preview(&payload)
        ))
    })?;

    if let Some(message) = parsed.error {
        return Ok(Some(StreamFrame::ErrorFrame { message }));
    }
    if let Some(updated_document) = parsed.updated_test_cases {
        return Ok(Some(StreamFrame::Directive {
            updated_document,
            note: parsed.confirmation,
        }));
    }
    if let Some(text) = parsed.chunk {
        return Ok(Some(StreamFrame::TextChunk { text }));
    }

    Err(CasegenError::protocol(format!(
        "payload without a known field: {:?}",
        preview(&payload)
    )))
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
