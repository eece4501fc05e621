//! Incremental decoder for the completion endpoint's event stream.
//!
//! The endpoint pushes newline-terminated lines of the form:
//!
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"Hi"}}]}
//!
//! data: {"id":"...","choices":[{"delta":{"content":" there"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Chunks arrive with arbitrary boundaries. The decoder buffers the tail of
//! the last incomplete line and only interprets complete lines, so the
//! output does not depend on how the input was split.

use mistral_types::StreamChunk;

/// Line prefix marking a payload frame.
const DATA_PREFIX: &str = "data: ";

/// Payload marking the end of the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty text fragment of the assistant reply.
    Content(String),
    /// The end-of-stream sentinel. Emitted at most once per stream.
    Done,
}

/// Stateful event-stream decoder. One instance serves one stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Create a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text chunk. See [`SseDecoder::process_bytes`].
    pub fn process_chunk(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.process_bytes(chunk.as_bytes())
    }

    /// Feed a raw chunk and return the frames completed by it, in order.
    ///
    /// A chunk may split a line or a multi-byte character anywhere; the
    /// remainder is held until the next call. Once [`SseFrame::Done`] has
    /// been returned all further input is ignored until [`reset`].
    ///
    /// [`reset`]: SseDecoder::reset
    pub fn process_bytes(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done || chunk.is_empty() {
            return frames;
        }
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return frames;
        };
        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);

        for line in complete.split(|&b| b == b'\n') {
            if self.decode_line(line, &mut frames) {
                self.buffer.clear();
                break;
            }
        }
        frames
    }

    /// Flush a trailing line that was never newline-terminated.
    ///
    /// Called when the transport reports end of body.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line, &mut frames);
        frames
    }

    /// Whether the end-of-stream sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Discard buffered input and forget any end-of-stream state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.done = false;
    }

    /// Decode one complete line. Returns `true` when it was the sentinel.
    fn decode_line(&mut self, line: &[u8], frames: &mut Vec<SseFrame>) -> bool {
        let line = String::from_utf8_lossy(line);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            return false;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            tracing::trace!(line = %line, "skipping non-data line");
            return false;
        };
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            self.done = true;
            frames.push(SseFrame::Done);
            return true;
        }
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                if let Some(content) = chunk.content() {
                    frames.push(SseFrame::Content(content.to_string()));
                }
            }
            Err(e) => {
                tracing::trace!(error = %e, "skipping undecodable frame");
            }
        }
        false
    }
}
