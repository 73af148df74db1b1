//! Offline study helper.
//!
//! Answers from a small table of keyword-triggered tips and streams the answer
//! back in the same event format a remote endpoint uses, so the whole read
//! path runs without a network.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use bytes::Bytes;
use itertools::Itertools;
use tracing::debug;

use crate::client::{ChatBackend, ClientError};
use crate::model::{ChatCompletionChunk, ChatRequest};
use crate::stream::ChunkedResponse;

/// Keywords (matched as lowercase substrings) and the tip they trigger.
/// The first matching row wins.
const TIPS: &[(&[&str], &str)] = &[
    (
        &["hello", "hi"],
        "Hello! How can I help with your studies today?",
    ),
    (
        &["essay", "write"],
        "When writing an essay, start with a clear thesis statement. Then create supporting \
         paragraphs with evidence and analysis. Make sure to conclude by restating your main \
         points and their significance.",
    ),
    (
        &["math", "solve"],
        "For math problems, remember to isolate the variable and perform the same operation on \
         both sides of the equation. Take your time and double-check your work.",
    ),
    (
        &["science", "project"],
        "Some interesting science project ideas include: testing water quality in your area, \
         building a simple solar oven, or measuring the effect of music on plant growth.",
    ),
    (
        &["translate"],
        "For translations, try to understand the context of the phrase rather than translating \
         word-by-word. This will help maintain the intended meaning.",
    ),
    (
        &["theme", "book"],
        "When analyzing themes in literature, look for recurring symbols, character development, \
         and how conflicts are resolved. These elements often reveal the author's message.",
    ),
];

const GENERIC_TIP: &str = "I'll try to help with that. Remember to break down complex problems \
into smaller steps and take your time understanding each concept thoroughly.";

/// Pick the canned reply for a user message.
pub fn canned_reply(message: &str) -> &'static str {
    let message = message.to_lowercase();
    TIPS.iter()
        .find(|(keywords, _)| keywords.iter().any(|k| message.contains(k)))
        .map_or(GENERIC_TIP, |(_, tip)| *tip)
}

/// A [`ChatBackend`] that needs no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAssistant {
    chunk_size: Option<NonZeroUsize>,
}

impl OfflineAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-cut the event stream into chunks of `size` bytes, ignoring event and
    /// character boundaries.
    pub fn with_chunk_size(mut self, size: NonZeroUsize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Encode `reply` as one event per word followed by the `[DONE]` sentinel.
    pub fn encode_events(reply: &str) -> Result<String, ClientError> {
        let events: Vec<String> = reply
            .split_inclusive(' ')
            .map(|word| serde_json::to_string(&ChatCompletionChunk::text(word)))
            .try_collect()?;

        Ok(events
            .iter()
            .map(|event| format!("data: {event}\n\n"))
            .chain(std::iter::once("data: [DONE]\n\n".to_string()))
            .join(""))
    }

    fn into_chunks(self, body: String) -> Vec<Bytes> {
        match self.chunk_size {
            Some(size) => body
                .as_bytes()
                .chunks(size.get())
                .map(Bytes::copy_from_slice)
                .collect(),
            None => body
                .split_inclusive("\n\n")
                .map(|event| Bytes::from(event.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ChatBackend for OfflineAssistant {
    type Response = ChunkedResponse;

    async fn open_stream(&self, request: ChatRequest) -> Result<Self::Response, ClientError> {
        let reply = canned_reply(request.last_user_content().unwrap_or_default());
        debug!(reply_len = reply.len(), "answering offline");

        let body = Self::encode_events(reply)?;
        Ok(ChunkedResponse::ok(self.into_chunks(body)))
    }
}
