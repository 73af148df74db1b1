//! Server-Sent Events (SSE) decoding primitives.
//!
//! The pieces here turn raw response bytes into `data:` payloads:
//! a stream-aware UTF-8 decoder, a line splitter, and the helpers that
//! recognise event lines and the end-of-stream sentinel.
//!
//! SSE format:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//!
//! data: [DONE]
//! ```

use itertools::Itertools;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`. The prefix must start the
/// line; the returned payload is trimmed.
///
/// # Example
/// ```
/// use studychat::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use studychat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == DONE_MARKER
}

/// Incremental UTF-8 decoder.
///
/// Bytes of a multi-byte character that are cut off at the end of one chunk
/// are held back and completed by the next chunk. Invalid sequences decode to
/// U+FFFD instead of failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            let (valid_up_to, error_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));

            match error_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid_up_to + len);
                }
                None => {
                    // Whatever is left is an incomplete character.
                    self.pending.drain(..valid_up_to);
                    return out;
                }
            }
        }
    }

    /// Flush the decoder at end of input.
    ///
    /// A truncated trailing character becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// How decoded text is cut into lines across network chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineSplitting {
    /// Hold back a trailing partial line until the next chunk completes it.
    #[default]
    Buffered,
    /// Split every chunk on its own. An event that straddles two chunks is
    /// seen as two broken lines.
    ChunkLocal,
}

/// Splits a stream of decoded text into lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    mode: LineSplitting,
    pending: String,
}

impl LineBuffer {
    pub fn new(mode: LineSplitting) -> Self {
        Self {
            mode,
            pending: String::new(),
        }
    }

    /// Feed decoded text and collect the lines it completes.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        match self.mode {
            LineSplitting::ChunkLocal => text.split('\n').map(str::to_string).collect_vec(),
            LineSplitting::Buffered => {
                self.pending.push_str(text);
                let Some(last_newline) = self.pending.rfind('\n') else {
                    return Vec::new();
                };
                let rest = self.pending.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.pending, rest);
                complete
                    .strip_suffix('\n')
                    .unwrap_or(&complete)
                    .split('\n')
                    .map(str::to_string)
                    .collect_vec()
            }
        }
    }

    /// Take the unterminated remainder at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.pending)).filter(|rest| !rest.is_empty())
    }
}
